use crate::collection::IndexedMap;
use crate::state::Decision;
use crate::xml::{XmlElement, XmlError, XmlSerializer};

pub(crate) const TAG_APP_OP: &str = "app-op";
pub(crate) const ATTR_NAME: &str = "name";
pub(crate) const ATTR_MODE: &str = "mode";

pub(crate) fn parse_app_op_modes(
    element: &XmlElement,
) -> Result<IndexedMap<String, Decision>, XmlError> {
    let mut app_op_modes = IndexedMap::new();
    for child in &element.children {
        if child.name != TAG_APP_OP {
            tracing::warn!(
                tag = %child.name,
                parent = %element.name,
                "ignoring unknown tag when parsing app-op modes"
            );
            continue;
        }
        let name = child.required_attribute(ATTR_NAME)?.to_string();
        let mode = child.int_attribute(ATTR_MODE)?;
        app_op_modes.insert(name, mode);
    }
    Ok(app_op_modes)
}

pub(crate) fn serialize_app_op_modes(
    serializer: &mut XmlSerializer,
    app_op_modes: &IndexedMap<String, Decision>,
) -> Result<(), XmlError> {
    for (name, mode) in app_op_modes {
        let mode = mode.to_string();
        serializer.empty_tag(
            TAG_APP_OP,
            &[(ATTR_NAME, name.as_str()), (ATTR_MODE, mode.as_str())],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn skips_unknown_children() {
        let xml = r#"
            <package name="com.example.app">
                <app-op name="CAMERA" mode="1"/>
                <app-op-v2 name="CAMERA" mode="4" attribution="x"/>
            </package>
        "#;
        let roots = parse_document(xml).unwrap();

        let modes = parse_app_op_modes(&roots[0]).unwrap();

        assert_eq!(modes.len(), 1);
        assert_eq!(modes["CAMERA"], 1);
    }

    #[test]
    fn serialized_modes_keep_order() {
        let mut modes = IndexedMap::new();
        modes.insert("RECORD_AUDIO".to_string(), 1);
        modes.insert("CAMERA".to_string(), 2);

        let mut serializer = XmlSerializer::new().unwrap();
        serializer
            .tag("package", &[], |s| serialize_app_op_modes(s, &modes))
            .unwrap();
        let xml = serializer.finish().unwrap();
        let roots = parse_document(&xml).unwrap();

        let parsed = parse_app_op_modes(&roots[0]).unwrap();
        assert_eq!(parsed, modes);
    }
}
