// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fragment binary format
//!
//! Little-endian throughout:
//!
//! ```text
//! u32 magic "FRAG" | u32 version | str name
//! u32 fragment_count
//!   str id | 4×f32 color | u32 n + n×f32 positions | u32 n + n×f32 normals
//!   u32 n + n×u32 indices | u32 n + n×(u32 item, str category)
//! u32 alignment_count
//!   u32 id | str name | u32 curve_count
//!     u32 n + n×(3×f64) points
//! ```
//!
//! Strings are a u16 byte length followed by UTF-8. Mesh ids are not stored;
//! the manager assigns them on insert.

use crate::{
    Alignment, AlignmentCurve, Fragment, FragmentGroup, FragmentId, ItemId, MeshGeometry, MeshId,
    Result, ViewerError,
};
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Binary format header magic number
pub const FRAGMENT_MAGIC: u32 = 0x4652_4147; // "FRAG" in ASCII

/// Current format version
pub const FRAGMENT_VERSION: u32 = 1;

/// Serialize a group
pub fn encode_group(group: &FragmentGroup) -> Result<Vec<u8>> {
    let mut w = Writer::default();
    w.u32(FRAGMENT_MAGIC);
    w.u32(FRAGMENT_VERSION);
    w.str(&group.name)?;

    w.len(group.fragments.len())?;
    for fragment in &group.fragments {
        w.str(fragment.id.as_str())?;
        for c in fragment.color {
            w.f32(c);
        }
        w.len(fragment.geometry.positions.len())?;
        fragment.geometry.positions.iter().for_each(|v| w.f32(*v));
        w.len(fragment.geometry.normals.len())?;
        fragment.geometry.normals.iter().for_each(|v| w.f32(*v));
        w.len(fragment.geometry.indices.len())?;
        fragment.geometry.indices.iter().for_each(|v| w.u32(*v));
        w.len(fragment.items.len())?;
        for (item, category) in &fragment.items {
            w.u32(item.0);
            w.str(category)?;
        }
    }

    w.len(group.alignments.len())?;
    for alignment in &group.alignments {
        w.u32(alignment.id);
        w.str(&alignment.name)?;
        w.len(alignment.absolute.len())?;
        for curve in &alignment.absolute {
            w.len(curve.points.len())?;
            for p in &curve.points {
                w.f64(p.x);
                w.f64(p.y);
                w.f64(p.z);
            }
        }
    }

    Ok(w.buf)
}

/// Deserialize a group. Truncated buffers, a wrong magic number or an
/// unknown version are errors; nothing partial is returned.
pub fn decode_group(data: &[u8]) -> Result<FragmentGroup> {
    let mut r = Reader::new(data);

    let magic = r.u32()?;
    if magic != FRAGMENT_MAGIC {
        return Err(ViewerError::codec(format!("invalid magic: {:08x}", magic)));
    }
    let version = r.u32()?;
    if version != FRAGMENT_VERSION {
        return Err(ViewerError::codec(format!(
            "unsupported version: {}",
            version
        )));
    }

    let mut group = FragmentGroup::new(r.str()?);

    let fragment_count = r.len()?;
    for _ in 0..fragment_count {
        let id = FragmentId(r.str()?);
        let mut color = [0.0f32; 4];
        for c in &mut color {
            *c = r.f32()?;
        }
        let positions = r.f32_vec()?;
        let normals = r.f32_vec()?;
        let indices = r.u32_vec()?;

        let item_count = r.len()?;
        let mut items = BTreeMap::new();
        for _ in 0..item_count {
            let item = ItemId(r.u32()?);
            items.insert(item, r.str()?);
        }

        group.fragments.push(Fragment::new(
            id,
            Arc::new(MeshGeometry::new(positions, normals, indices)),
            items,
            color,
        ));
    }

    let alignment_count = r.len()?;
    for _ in 0..alignment_count {
        let id = r.u32()?;
        let name = r.str()?;
        let curve_count = r.len()?;
        let mut curves = Vec::with_capacity(curve_count.min(1024));
        for index in 0..curve_count {
            let point_count = r.len()?;
            let mut points = Vec::with_capacity(point_count.min(4096));
            for _ in 0..point_count {
                points.push(Point3::new(r.f64()?, r.f64()?, r.f64()?));
            }
            curves.push(AlignmentCurve::new(index, points, MeshId(0)));
        }
        group
            .alignments
            .push(Arc::new(Alignment::new(id, name, curves)));
    }

    if !r.is_at_end() {
        log::debug!(
            "[Codec] {} trailing bytes after fragment data",
            r.remaining()
        );
    }

    Ok(group)
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn len(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n).map_err(|_| ViewerError::codec("collection too large"))?;
        self.u32(n);
        Ok(())
    }

    fn str(&mut self, s: &str) -> Result<()> {
        let n = u16::try_from(s.len())
            .map_err(|_| ViewerError::codec(format!("string too long ({} bytes)", s.len())))?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                ViewerError::codec(format!("data truncated at byte {}", self.cursor))
            })?;
        let slice = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    fn str(&mut self) -> Result<String> {
        let n = u16::from_le_bytes(self.array()?) as usize;
        let bytes = self.take(n)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ViewerError::codec(e.to_string()))
    }

    fn f32_vec(&mut self) -> Result<Vec<f32>> {
        let n = self.len()?;
        let bytes = self.take(n.checked_mul(4).ok_or_else(|| ViewerError::codec("overflow"))?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn u32_vec(&mut self) -> Result<Vec<u32>> {
        let n = self.len()?;
        let bytes = self.take(n.checked_mul(4).ok_or_else(|| ViewerError::codec("overflow"))?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_road;

    #[test]
    fn test_demo_road_survives_encoding() {
        let road = demo_road();
        let bytes = encode_group(&road).unwrap();
        let decoded = decode_group(&bytes).unwrap();

        assert_eq!(decoded.name, road.name);
        assert_eq!(decoded.fragments.len(), road.fragments.len());
        assert_eq!(decoded.fragments[0].id, road.fragments[0].id);
        assert_eq!(decoded.fragments[0].items, road.fragments[0].items);
        assert_eq!(decoded.fragments[0].geometry, road.fragments[0].geometry);
        assert_eq!(decoded.alignments.len(), 1);
        assert_eq!(
            decoded.alignments[0].absolute[0].points,
            road.alignments[0].absolute[0].points
        );
    }

    #[test]
    fn test_invalid_magic() {
        let err = decode_group(&[0, 0, 0, 0, 1, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ViewerError::Codec(_)));
    }

    #[test]
    fn test_truncated_data() {
        let bytes = encode_group(&demo_road()).unwrap();
        let err = decode_group(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode_group(&FragmentGroup::new("empty")).unwrap();
        bytes[4] = 9;
        assert!(decode_group(&bytes)
            .unwrap_err()
            .to_string()
            .contains("unsupported version"));
    }
}
