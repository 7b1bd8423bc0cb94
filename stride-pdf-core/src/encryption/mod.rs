//! PDF encryption support
//!
//! Password-based (standard) encryption with RC4 40/128-bit keys is fully
//! supported for both loading and saving. Other schemes are recognized and
//! classified so callers can tell "wrong password" from "unsupported
//! scheme" from "missing certificate credential" — the remediation differs
//! for each.

mod encryption_dict;
mod permissions;
mod rc4;
mod standard_security;

pub use encryption_dict::EncryptionDictionary;
pub use permissions::Permissions;
pub use rc4::{rc4_apply, Rc4};
pub use standard_security::{SecurityRevision, StandardSecurityHandler};

/// Encryption scheme of a document, derived from the security filter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptType {
    /// Not encrypted.
    None,
    /// Standard password encryption.
    Password,
    /// Public-key (certificate) encryption.
    Certificate,
    /// Digital rights management scheme.
    Drm,
    /// Rights-management services.
    Rms,
    /// An unrecognized custom filter.
    Custom,
}

impl EncryptType {
    pub(crate) fn from_filter(filter: &str) -> Self {
        match filter {
            "Standard" => EncryptType::Password,
            "Adobe.PubSec" | "Adobe.PPKLite" | "Adobe.PPKMS" => EncryptType::Certificate,
            "MicrosoftIRMServices" => EncryptType::Rms,
            "EbookDRM" | "FOPN_foweb" => EncryptType::Drm,
            _ => EncryptType::Custom,
        }
    }
}

/// How a candidate password classifies against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordType {
    /// Rejected by the document.
    Invalid,
    /// The document is not password-protected.
    NoPassword,
    /// Accepted as the user (open) password.
    User,
    /// Accepted as the owner (permissions) password.
    Owner,
}

/// Encryption settings applied at the next save.
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub user_password: String,
    pub owner_password: String,
    pub permissions: Permissions,
    pub strength: EncryptionStrength,
}

/// Key strength for password encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionStrength {
    Rc4_40bit,
    Rc4_128bit,
}

impl SecuritySettings {
    pub fn new(
        user_password: impl Into<String>,
        owner_password: impl Into<String>,
        permissions: Permissions,
        strength: EncryptionStrength,
    ) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: owner_password.into(),
            permissions,
            strength,
        }
    }

    /// Passwords with all permissions granted and 128-bit keys.
    pub fn with_passwords(
        user_password: impl Into<String>,
        owner_password: impl Into<String>,
    ) -> Self {
        Self::new(
            user_password,
            owner_password,
            Permissions::all(),
            EncryptionStrength::Rc4_128bit,
        )
    }

    pub fn handler(&self) -> StandardSecurityHandler {
        match self.strength {
            EncryptionStrength::Rc4_40bit => StandardSecurityHandler::rc4_40bit(),
            EncryptionStrength::Rc4_128bit => StandardSecurityHandler::rc4_128bit(),
        }
    }

    /// Build the encryption dictionary and file key for a save.
    pub fn prepare(&self, file_id: Option<&[u8]>) -> (EncryptionDictionary, Vec<u8>) {
        let handler = self.handler();
        let o = handler.compute_owner_entry(&self.owner_password, &self.user_password);
        let u = handler.compute_user_entry(&self.user_password, &o, self.permissions, file_id);
        let key = handler.compute_encryption_key(&self.user_password, &o, self.permissions, file_id);

        let dict = match self.strength {
            EncryptionStrength::Rc4_40bit => {
                EncryptionDictionary::rc4_40bit(o, u, self.permissions)
            }
            EncryptionStrength::Rc4_128bit => {
                EncryptionDictionary::rc4_128bit(o, u, self.permissions)
            }
        };
        (dict, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_classification() {
        assert_eq!(EncryptType::from_filter("Standard"), EncryptType::Password);
        assert_eq!(
            EncryptType::from_filter("Adobe.PubSec"),
            EncryptType::Certificate
        );
        assert_eq!(
            EncryptType::from_filter("MicrosoftIRMServices"),
            EncryptType::Rms
        );
        assert_eq!(EncryptType::from_filter("EbookDRM"), EncryptType::Drm);
        assert_eq!(EncryptType::from_filter("Anything"), EncryptType::Custom);
    }

    #[test]
    fn test_settings_prepare_produces_valid_entries() {
        let settings = SecuritySettings::with_passwords("u", "o");
        let file_id = [0x11u8; 16];
        let (dict, key) = settings.prepare(Some(&file_id));

        assert_eq!(dict.r, 3);
        assert_eq!(key.len(), 16);
        let handler = settings.handler();
        assert!(handler.authenticate_user_password(
            "u",
            &dict.o,
            &dict.u,
            dict.permissions(),
            Some(&file_id)
        ));
        assert!(handler.authenticate_owner_password(
            "o",
            &dict.o,
            &dict.u,
            dict.permissions(),
            Some(&file_id)
        ));
    }

    #[test]
    fn test_40bit_strength() {
        let settings = SecuritySettings::new(
            "u",
            "o",
            Permissions::default(),
            EncryptionStrength::Rc4_40bit,
        );
        let (dict, key) = settings.prepare(None);
        assert_eq!(dict.r, 2);
        assert_eq!(key.len(), 5);
    }
}
