use std::sync::Once;

use json_serialize::{
    declare_as, encode_dyn, ClassId, EncodeOptions, JsonClass, JsonSerialize, SerializeError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Man {
    name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Woman {
    name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Family {
    father: Option<Box<dyn JsonClass>>,
    mother: Option<Box<dyn JsonClass>>,
    son: Option<Box<dyn JsonClass>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Stray {
    id: u32,
}

fn declare_family() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        declare_as::<Man>(ClassId::new("nested.Man").unwrap()).unwrap();
        declare_as::<Woman>(ClassId::new("nested.Woman").unwrap()).unwrap();
        declare_as::<Family>(ClassId::new("nested.Family").unwrap()).unwrap();
    });
}

#[test]
fn test_nested_concrete_types_survive() {
    declare_family();

    let family = Family {
        father: Some(Box::new(Man {
            name: "Jason".to_string(),
        })),
        mother: Some(Box::new(Woman {
            name: "Maria".to_string(),
        })),
        son: Some(Box::new(Man {
            name: "Tom".to_string(),
        })),
    };

    let text = family.to_json().unwrap();
    let restored = Family::from_json(&text).unwrap();

    let father = restored.father.unwrap();
    let father = (*father).as_any().downcast_ref::<Man>().unwrap();
    assert_eq!(father.name, "Jason");

    let mother = restored.mother.unwrap();
    assert!((*mother).as_any().downcast_ref::<Woman>().is_some());

    let son = restored.son.unwrap();
    let son = (*son).as_any().downcast_ref::<Man>().unwrap();
    assert_eq!(son.name, "Tom");
}

#[test]
fn test_nested_objects_carry_their_own_tags() {
    declare_family();

    let family = Family {
        father: Some(Box::new(Man {
            name: "Jason".to_string(),
        })),
        mother: None,
        son: None,
    };

    let text = family.to_json_with(EncodeOptions::compact()).unwrap();
    let tree: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(tree["_CLSID_"], "nested.Family");
    assert_eq!(tree["father"]["_CLSID_"], "nested.Man");
    assert_eq!(tree["father"]["name"], "Jason");
    assert_eq!(tree["mother"], serde_json::Value::Null);
}

#[test]
fn test_absent_members_stay_absent() {
    declare_family();

    let restored = Family::from_json(r#"{"_CLSID_":"nested.Family"}"#).unwrap();
    assert!(restored.father.is_none());
    assert!(restored.mother.is_none());
    assert!(restored.son.is_none());
}

#[test]
fn test_undeclared_dynamic_value_is_not_serializable() {
    declare_family();

    let stray: Box<dyn JsonClass> = Box::new(Stray { id: 7 });
    let err = encode_dyn(stray.as_ref(), EncodeOptions::default()).unwrap_err();
    assert!(matches!(err, SerializeError::NotSerializable(_)));
}

#[test]
fn test_undeclared_nested_value_fails_encode() {
    declare_family();

    let family = Family {
        father: Some(Box::new(Stray { id: 7 })),
        mother: None,
        son: None,
    };
    // The failure crosses a serde boundary, so it surfaces as a JSON error.
    let err = family.to_json().unwrap_err();
    assert!(matches!(err, SerializeError::Json(_)));
}
