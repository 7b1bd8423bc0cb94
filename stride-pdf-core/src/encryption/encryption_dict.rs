//! The `/Encrypt` dictionary
//!
//! Maps between the stored dictionary and a typed record, and classifies
//! the security filter so callers get the right error kind for schemes
//! this crate cannot open (certificate, rights-management, custom).

use crate::encryption::{EncryptType, Permissions};
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};

/// Typed view of an encryption dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionDictionary {
    /// Security filter name (`Standard` for password encryption).
    pub filter: String,
    /// Algorithm version (`V`).
    pub v: i64,
    /// Handler revision (`R`).
    pub r: i64,
    /// Owner password entry (`O`, 32 bytes).
    pub o: Vec<u8>,
    /// User password entry (`U`, 32 bytes).
    pub u: Vec<u8>,
    /// Permission bits (`P`).
    pub p: i32,
    /// Key length in bits (`Length`), absent for 40-bit revision 2.
    pub length: Option<i64>,
}

impl EncryptionDictionary {
    /// Record for a revision 2, RC4 40-bit save.
    pub fn rc4_40bit(o: Vec<u8>, u: Vec<u8>, permissions: Permissions) -> Self {
        Self {
            filter: "Standard".to_string(),
            v: 1,
            r: 2,
            o,
            u,
            p: permissions.to_p_value(),
            length: None,
        }
    }

    /// Record for a revision 3, RC4 128-bit save.
    pub fn rc4_128bit(o: Vec<u8>, u: Vec<u8>, permissions: Permissions) -> Self {
        Self {
            filter: "Standard".to_string(),
            v: 2,
            r: 3,
            o,
            u,
            p: permissions.to_p_value(),
            length: Some(128),
        }
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_p_value(self.p)
    }

    /// Which encryption scheme the filter name denotes.
    pub fn encrypt_type(&self) -> EncryptType {
        EncryptType::from_filter(&self.filter)
    }

    /// Parse from the object the trailer's `/Encrypt` entry resolves to.
    pub fn from_dictionary(dict: &Dictionary) -> Result<Self> {
        let filter = dict
            .get_name("Filter")
            .ok_or_else(|| PdfError::Format("Encryption dictionary missing /Filter".to_string()))?
            .to_string();

        match EncryptType::from_filter(&filter) {
            EncryptType::Password => {}
            EncryptType::Certificate => {
                return Err(PdfError::Certificate(format!(
                    "No credential available for filter {filter}"
                )))
            }
            _ => {
                return Err(PdfError::SecurityHandler(filter));
            }
        }

        let r = dict
            .get_integer("R")
            .ok_or_else(|| PdfError::Format("Encryption dictionary missing /R".to_string()))?;
        let o = dict
            .get_string_bytes("O")
            .ok_or_else(|| PdfError::Format("Encryption dictionary missing /O".to_string()))?
            .to_vec();
        let u = dict
            .get_string_bytes("U")
            .ok_or_else(|| PdfError::Format("Encryption dictionary missing /U".to_string()))?
            .to_vec();
        let p = dict
            .get_integer("P")
            .ok_or_else(|| PdfError::Format("Encryption dictionary missing /P".to_string()))?
            as i32;

        Ok(Self {
            filter,
            v: dict.get_integer("V").unwrap_or(0),
            r,
            o,
            u,
            p,
            length: dict.get_integer("Length"),
        })
    }

    /// Serialize for the writer. Encryption dictionary strings are never
    /// themselves encrypted.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name(self.filter.clone()));
        dict.set("V", self.v);
        dict.set("R", self.r);
        dict.set("O", Object::String(self.o.clone()));
        dict.set("U", Object::String(self.u.clone()));
        dict.set("P", self.p as i64);
        if let Some(length) = self.length {
            dict.set("Length", length);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc4_constructors() {
        let dict = EncryptionDictionary::rc4_40bit(vec![0; 32], vec![1; 32], Permissions::all());
        assert_eq!(dict.v, 1);
        assert_eq!(dict.r, 2);
        assert_eq!(dict.length, None);

        let dict = EncryptionDictionary::rc4_128bit(vec![0; 32], vec![1; 32], Permissions::all());
        assert_eq!(dict.v, 2);
        assert_eq!(dict.r, 3);
        assert_eq!(dict.length, Some(128));
    }

    #[test]
    fn test_dictionary_round_trip() {
        let record =
            EncryptionDictionary::rc4_128bit(vec![7; 32], vec![9; 32], Permissions::PRINT);
        let parsed = EncryptionDictionary::from_dictionary(&record.to_dictionary()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.permissions(), Permissions::PRINT);
    }

    #[test]
    fn test_certificate_filter_is_certificate_error() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Adobe.PubSec"));
        assert!(matches!(
            EncryptionDictionary::from_dictionary(&dict),
            Err(PdfError::Certificate(_))
        ));
    }

    #[test]
    fn test_unknown_filter_is_security_handler_error() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("ACME.Secret"));
        match EncryptionDictionary::from_dictionary(&dict) {
            Err(PdfError::SecurityHandler(name)) => assert_eq!(name, "ACME.Secret"),
            other => panic!("expected SecurityHandler error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_entries_are_format_errors() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Standard"));
        dict.set("R", 2);
        assert!(matches!(
            EncryptionDictionary::from_dictionary(&dict),
            Err(PdfError::Format(_))
        ));
    }
}
