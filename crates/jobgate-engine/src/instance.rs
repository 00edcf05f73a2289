//! Instance existence check against the registry listing

use crate::types::RegisteredThing;

/// True iff `name` is the `instance` attribute of any listed thing
pub fn instance_exists(name: &str, listing: &[RegisteredThing]) -> bool {
    listing
        .iter()
        .filter_map(RegisteredThing::instance_name)
        .any(|instance| instance == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn thing(name: &str, instance: Option<&str>) -> RegisteredThing {
        let mut attributes = HashMap::new();
        if let Some(instance) = instance {
            attributes.insert("instance".to_string(), instance.to_string());
            attributes.insert("workflow".to_string(), "coupon-prep".to_string());
        }
        RegisteredThing {
            thing_name: name.to_string(),
            attributes,
        }
    }

    #[test]
    fn test_registered_instance() {
        let listing = vec![thing("TestThing_1", Some("zach")), thing("TestThing_2", None)];
        assert!(instance_exists("zach", &listing));
    }

    #[test]
    fn test_unregistered_instance() {
        let listing = vec![thing("TestThing_1", Some("zach")), thing("TestThing_2", None)];
        assert!(!instance_exists("zac", &listing));
        assert!(!instance_exists("TestThing_2", &listing));
    }

    #[test]
    fn test_empty_listing() {
        assert!(!instance_exists("zach", &[]));
    }
}
