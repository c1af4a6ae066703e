//! Desktop entry point for the IFC-Civil viewer

fn main() {
    ifc_civil_bevy::run_native();
}
