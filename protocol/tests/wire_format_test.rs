//! Wire-format tests for the shared protocol types.
//!
//! Records produced by the accounting core are exported as JSON; these pin
//! down how identities and ecosystems look on the wire and that parsing
//! accepts what operators actually type.

use bluecarbon_protocol::{CarbonEstimate, EcosystemType, Identity};

#[test]
fn identity_is_a_bare_json_string() {
    let id: Identity = "0xa1b2c3".parse().unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"0xa1b2c3\"");
    let back: Identity = serde_json::from_str("\"0xa1b2c3\"").unwrap();
    assert_eq!(back, id);
}

#[test]
fn ecosystem_names_are_kebab_case() {
    assert_eq!(
        serde_json::to_string(&EcosystemType::SaltMarsh).unwrap(),
        "\"salt-marsh\""
    );
    for ecosystem in EcosystemType::ALL {
        let parsed: EcosystemType = ecosystem.to_string().parse().unwrap();
        assert_eq!(parsed, ecosystem);
    }
    assert_eq!("Salt_Marsh".parse::<EcosystemType>().unwrap(), EcosystemType::SaltMarsh);
    assert!("kelp".parse::<EcosystemType>().is_err());
}

#[test]
fn null_identities() {
    assert!(Identity::null().is_null());
    assert!(Identity::new("0x0000000000000000000000000000000000000000").is_null());
    assert!(!Identity::new("0x00000000000000000000000000000000000000a1").is_null());
    assert!("".parse::<Identity>().is_err());
}

#[test]
fn five_thousand_square_meters_of_mangrove() {
    assert_eq!(EcosystemType::Mangrove.estimate_credits(5_000), 10_000);

    let estimate = CarbonEstimate::from_biomass(10.0, 5_000);
    assert!((estimate.biomass_kg - 50_000.0).abs() < 1e-6);
    assert!((estimate.carbon_kg - 23_500.0).abs() < 1e-6);
    assert_eq!(estimate.co2e_tonnes(), 86);
}
