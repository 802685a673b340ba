//! Request bodies for the AMT power management service.

use crate::wsman::xml::Element;
use crate::wsman::{NS_WSA, NS_WSMAN, WSA_ANONYMOUS};

use super::{CIM_COMPUTER_SYSTEM, CIM_POWER_MANAGEMENT_SERVICE};

/// Build the `RequestPowerStateChange_INPUT` body asking for `target_code`.
///
/// The code is not validated here; deciding which codes may be requested is
/// the controller's job.
pub fn build_power_state_request(target_code: u32) -> Element {
    let ns = CIM_POWER_MANAGEMENT_SERVICE;

    let selector_set = Element::new(NS_WSMAN, "SelectorSet").with_child(
        Element::leaf(NS_WSMAN, "Selector", "ManagedSystem").with_attribute("Name", "Name"),
    );

    let reference_parameters = Element::new(NS_WSA, "ReferenceParameters")
        .with_child(Element::leaf(NS_WSMAN, "ResourceURI", CIM_COMPUTER_SYSTEM))
        .with_child(selector_set);

    let managed_element = Element::new(ns, "ManagedElement")
        .with_child(Element::leaf(NS_WSA, "Address", WSA_ANONYMOUS))
        .with_child(reference_parameters);

    Element::new(ns, "RequestPowerStateChange_INPUT")
        .with_child(Element::leaf(ns, "PowerState", target_code.to_string()))
        .with_child(managed_element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amt::PowerState;

    #[test]
    fn test_root_and_power_state() {
        let body = build_power_state_request(PowerState::On.code());

        assert!(body.is(CIM_POWER_MANAGEMENT_SERVICE, "RequestPowerStateChange_INPUT"));
        let power_state = body.child(CIM_POWER_MANAGEMENT_SERVICE, "PowerState").unwrap();
        assert_eq!(power_state.text(), Some("2"));
    }

    #[test]
    fn test_managed_element_reference() {
        let body = build_power_state_request(8);
        let managed = body
            .child(CIM_POWER_MANAGEMENT_SERVICE, "ManagedElement")
            .unwrap();

        assert_eq!(
            managed.child(NS_WSA, "Address").and_then(Element::text),
            Some(WSA_ANONYMOUS)
        );

        let reference = managed.child(NS_WSA, "ReferenceParameters").unwrap();
        assert_eq!(
            reference.child(NS_WSMAN, "ResourceURI").and_then(Element::text),
            Some(CIM_COMPUTER_SYSTEM)
        );

        let selector = reference
            .child(NS_WSMAN, "SelectorSet")
            .and_then(|set| set.child(NS_WSMAN, "Selector"))
            .unwrap();
        assert_eq!(selector.attribute("Name"), Some("Name"));
        assert_eq!(selector.text(), Some("ManagedSystem"));
    }

    #[test]
    fn test_any_code_is_accepted() {
        let body = build_power_state_request(99);
        assert_eq!(
            body.find_first(CIM_POWER_MANAGEMENT_SERVICE, "PowerState")
                .and_then(Element::text),
            Some("99")
        );
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(build_power_state_request(5), build_power_state_request(5));
    }
}
