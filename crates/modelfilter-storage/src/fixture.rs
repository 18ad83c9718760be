use modelfilter_core::{Item, PropertyValue};

pub const FIXTURE_SOURCE: &str = "fixture";

fn element(objectid: u64, name: &str, external_id: &str) -> Item {
    let mut item = Item::new(external_id).with_name(name);
    item.objectid = Some(objectid);
    item
}

/// Built-in sample collection exercising the comparison edge cases: mixed
/// case, missing categories and fields, null and empty values, numbers
/// stored with and without units.
pub fn fixture_items() -> Vec<Item> {
    let mut roof = element(5, "Roof E", "ext-005").with_property("Dimensions", "Volume", "7.2 m^3");
    if let Some(props) = roof.properties.as_mut() {
        props.insert("Constraints".to_string(), Default::default());
    }

    vec![
        element(1, "Wall A", "ext-001")
            .with_property("Constraints", "Level", "Level 1")
            .with_property("Dimensions", "Area", "12.5 m^2")
            .with_property("Dimensions", "Volume", "4.0 m^3"),
        element(2, "Floor B", "ext-002")
            .with_property("Constraints", "Level", "Level 2")
            .with_property("Dimensions", "Area", "25.0 m^2")
            .with_property("Dimensions", "Volume", "10.0 m^3"),
        element(3, "Window C", "ext-003")
            .with_property("Constraints", "Level", "Level 1 - South")
            .with_property("Dimensions", "Area", "9.5 m^2"),
        element(4, "Door D", "ext-004").with_property("Dimensions", "Area", "4.5 m^2"),
        roof,
        element(6, "Wall F", "ext-006")
            .with_property("Constraints", "Level", "Level 3")
            .with_property("Dimensions", "Area", "5.0 m^2"),
        element(7, "Beam G", "ext-007")
            .with_property("Constraints", "Level", "LEVEL 1")
            .with_property("Dimensions", "Area", "10.0 m^2"),
        element(8, "Ceiling H", "ext-008")
            .with_property("Constraints", "Level", PropertyValue::Null)
            .with_property("Dimensions", "Area", "15.0 m^2"),
        element(9, "Floor I", "ext-009")
            .with_property("Constraints", "Level", "")
            .with_property("Dimensions", "Area", ""),
        element(10, "Column J", "ext-010")
            .with_property("Constraints", "Level", "Level 2")
            .with_property("Dimensions", "Area", "20.0"),
        element(11, "Slab K", "ext-011")
            .with_property("Constraints", "Level", "Level 3")
            .with_property("Dimensions", "Area", 20.0),
        element(12, "Ramp L", "ext-012")
            .with_property("Constraints", "Level", "Ground Floor")
            .with_property("Dimensions", "Area", "50.0 m^2")
            .with_property("Dimensions", "Volume", "15.0 m^3"),
        element(13, "Wall M", "ext-013")
            .with_property("Constraints", "Level", "Level 1")
            .with_property("Dimensions", "Area", "12.5 m^2")
            .with_property("Dimensions", "Volume", "12.0 m^3"),
        element(14, "Foundation N", "ext-014")
            .with_property("Constraints", "Level", "Basement")
            .with_property("Dimensions", "Area", "100.0 m^2")
            .with_property("Dimensions", "Volume", "80.0 m^3"),
        element(15, "Curtain Wall O", "ext-015").with_property("Constraints", "Level", "Level 5"),
    ]
}
