// Base64 (de)serialization for raw byte fields such as barcode images.
// Keeps the JSON and BSON representations as a plain string instead of
// an array of numbers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| serde::de::Error::custom(format!("invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "super")]
        data: Vec<u8>,
    }

    #[test]
    fn test_bytes_are_written_as_base64_string() {
        let holder = Holder { data: vec![0xde, 0xad, 0xbe, 0xef] };
        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json["data"], "3q2+7w==");

        let back: Holder = serde_json::from_value(json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let result: Result<Holder, _> = serde_json::from_str(r#"{"data":"not base64!"}"#);
        assert!(result.is_err());
    }
}
