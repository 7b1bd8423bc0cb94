//! Standard security handler (ISO 32000-1 section 7.6.3)
//!
//! Implements the password-based handler for revisions 2-4: MD5 key
//! derivation, RC4 string/stream encryption, owner/user password entries,
//! and the authentication algorithms used when loading. Revision 4 is
//! accepted on load and treated with the revision 3 algorithms (crypt
//! filters other than V2 are rejected earlier, by the dictionary parser).

#![allow(clippy::needless_range_loop)]

use crate::encryption::rc4::rc4_apply;
use crate::encryption::Permissions;
use crate::error::{PdfError, Result};
use crate::objects::ObjectId;

/// Padding applied to passwords shorter than 32 bytes (ISO 32000-1,
/// Algorithm 2 step a).
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Handler revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum SecurityRevision {
    /// RC4, 40-bit keys.
    R2 = 2,
    /// RC4, up to 128-bit keys.
    R3 = 3,
    /// RC4 via crypt filters; same algorithms as R3 here.
    R4 = 4,
}

pub struct StandardSecurityHandler {
    revision: SecurityRevision,
    /// Key length in bytes.
    key_length: usize,
}

impl StandardSecurityHandler {
    pub fn rc4_40bit() -> Self {
        Self {
            revision: SecurityRevision::R2,
            key_length: 5,
        }
    }

    pub fn rc4_128bit() -> Self {
        Self {
            revision: SecurityRevision::R3,
            key_length: 16,
        }
    }

    /// Build a handler for the revision found in an encryption dictionary.
    pub fn from_revision(revision: i64, length_bits: Option<i64>) -> Result<Self> {
        let key_length = match length_bits {
            Some(bits) if bits % 8 == 0 && (40..=128).contains(&bits) => (bits / 8) as usize,
            Some(bits) => {
                return Err(PdfError::SecurityHandler(format!(
                    "Unsupported key length: {bits} bits"
                )))
            }
            None => 5,
        };
        match revision {
            2 => Ok(Self {
                revision: SecurityRevision::R2,
                key_length: 5,
            }),
            3 => Ok(Self {
                revision: SecurityRevision::R3,
                key_length,
            }),
            4 => Ok(Self {
                revision: SecurityRevision::R4,
                key_length,
            }),
            other => Err(PdfError::SecurityHandler(format!(
                "Standard security handler revision {other} not supported"
            ))),
        }
    }

    pub fn revision(&self) -> SecurityRevision {
        self.revision
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    fn pad_password(password: &str) -> [u8; 32] {
        let mut padded = [0u8; 32];
        let bytes = password.as_bytes();
        let len = bytes.len().min(32);
        padded[..len].copy_from_slice(&bytes[..len]);
        if len < 32 {
            padded[len..].copy_from_slice(&PADDING[..32 - len]);
        }
        padded
    }

    fn owner_key(&self, owner_password: &str) -> Vec<u8> {
        let padded = Self::pad_password(owner_password);
        let mut hash = md5::compute(padded).to_vec();
        if self.revision >= SecurityRevision::R3 {
            for _ in 0..50 {
                hash = md5::compute(&hash).to_vec();
            }
        }
        hash.truncate(self.key_length);
        hash
    }

    /// Compute the `O` entry (Algorithm 3). An empty owner password falls
    /// back to the user password, as the format prescribes.
    pub fn compute_owner_entry(&self, owner_password: &str, user_password: &str) -> Vec<u8> {
        let effective_owner = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };
        let key = self.owner_key(effective_owner);
        let user_pad = Self::pad_password(user_password);

        let mut entry = rc4_apply(&key, &user_pad);
        if self.revision >= SecurityRevision::R3 {
            for i in 1..=19u8 {
                let iter_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                entry = rc4_apply(&iter_key, &entry);
            }
        }
        entry
    }

    /// Compute the file encryption key from a user password (Algorithm 2).
    pub fn compute_encryption_key(
        &self,
        user_password: &str,
        owner_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> Vec<u8> {
        self.key_from_padded(
            &Self::pad_password(user_password),
            owner_entry,
            permissions,
            file_id,
        )
    }

    fn key_from_padded(
        &self,
        padded: &[u8; 32],
        owner_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> Vec<u8> {
        let mut data = Vec::with_capacity(72);
        data.extend_from_slice(padded);
        data.extend_from_slice(owner_entry);
        data.extend_from_slice(&(permissions.to_p_value() as u32).to_le_bytes());
        if let Some(id) = file_id {
            data.extend_from_slice(id);
        }

        let mut hash = md5::compute(&data).to_vec();
        if self.revision >= SecurityRevision::R3 {
            for _ in 0..50 {
                hash = md5::compute(&hash[..self.key_length]).to_vec();
            }
        }
        hash.truncate(self.key_length);
        hash
    }

    /// Compute the `U` entry (Algorithms 4 and 5).
    pub fn compute_user_entry(
        &self,
        user_password: &str,
        owner_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> Vec<u8> {
        let key = self.compute_encryption_key(user_password, owner_entry, permissions, file_id);
        self.user_entry_from_key(&key, file_id)
    }

    fn user_entry_from_key(&self, key: &[u8], file_id: Option<&[u8]>) -> Vec<u8> {
        match self.revision {
            SecurityRevision::R2 => rc4_apply(key, &PADDING),
            SecurityRevision::R3 | SecurityRevision::R4 => {
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(&PADDING);
                if let Some(id) = file_id {
                    data.extend_from_slice(id);
                }
                let hash = md5::compute(&data);

                let mut entry = rc4_apply(key, hash.as_slice());
                for i in 1..=19u8 {
                    let iter_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                    entry = rc4_apply(&iter_key, &entry);
                }
                // Only the first 16 bytes are significant; pad to 32.
                entry.resize(32, 0);
                entry
            }
        }
    }

    fn user_entries_match(&self, a: &[u8], b: &[u8]) -> bool {
        match self.revision {
            SecurityRevision::R2 => a == b,
            _ => a.len() >= 16 && b.len() >= 16 && a[..16] == b[..16],
        }
    }

    /// Algorithm 6: does `candidate` open the document as the user?
    pub fn authenticate_user_password(
        &self,
        candidate: &str,
        owner_entry: &[u8],
        user_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> bool {
        let key = self.compute_encryption_key(candidate, owner_entry, permissions, file_id);
        let computed = self.user_entry_from_key(&key, file_id);
        self.user_entries_match(&computed, user_entry)
    }

    /// Algorithm 7: does `candidate` open the document as the owner?
    pub fn authenticate_owner_password(
        &self,
        candidate: &str,
        owner_entry: &[u8],
        user_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> bool {
        let Some(user_pad) = self.decrypt_owner_entry(candidate, owner_entry) else {
            return false;
        };
        let key = self.key_from_padded(&user_pad, owner_entry, permissions, file_id);
        let computed = self.user_entry_from_key(&key, file_id);
        self.user_entries_match(&computed, user_entry)
    }

    /// Invert Algorithm 3: the padded user password, given the owner
    /// password.
    fn decrypt_owner_entry(&self, owner_password: &str, owner_entry: &[u8]) -> Option<[u8; 32]> {
        if owner_entry.len() != 32 {
            return None;
        }
        let key = self.owner_key(owner_password);
        let mut data = owner_entry.to_vec();
        if self.revision >= SecurityRevision::R3 {
            for i in (1..=19u8).rev() {
                let iter_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                data = rc4_apply(&iter_key, &data);
            }
        }
        data = rc4_apply(&key, &data);
        let mut padded = [0u8; 32];
        padded.copy_from_slice(&data);
        Some(padded)
    }

    /// File encryption key obtained via the owner password, or `None`
    /// when the candidate is not the owner password.
    pub fn owner_file_key(
        &self,
        candidate: &str,
        owner_entry: &[u8],
        user_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> Option<Vec<u8>> {
        let user_pad = self.decrypt_owner_entry(candidate, owner_entry)?;
        let key = self.key_from_padded(&user_pad, owner_entry, permissions, file_id);
        let computed = self.user_entry_from_key(&key, file_id);
        if self.user_entries_match(&computed, user_entry) {
            Some(key)
        } else {
            None
        }
    }

    /// Recover the user password from a verified owner password. Returns
    /// `None` when `owner_password` is not the owner password.
    pub fn recover_user_password(
        &self,
        owner_password: &str,
        owner_entry: &[u8],
        user_entry: &[u8],
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> Option<Vec<u8>> {
        let user_pad = self.decrypt_owner_entry(owner_password, owner_entry)?;
        let key = self.key_from_padded(&user_pad, owner_entry, permissions, file_id);
        let computed = self.user_entry_from_key(&key, file_id);
        if !self.user_entries_match(&computed, user_entry) {
            return None;
        }
        Some(strip_padding(&user_pad))
    }

    /// Per-object key (Algorithm 1).
    pub fn object_key(&self, file_key: &[u8], id: ObjectId) -> Vec<u8> {
        let mut data = Vec::with_capacity(file_key.len() + 5);
        data.extend_from_slice(file_key);
        data.extend_from_slice(&id.number().to_le_bytes()[..3]);
        data.extend_from_slice(&id.generation().to_le_bytes()[..2]);
        let mut hash = md5::compute(&data).to_vec();
        hash.truncate((file_key.len() + 5).min(16));
        hash
    }

    /// Encrypt string or stream bytes belonging to object `id`.
    pub fn encrypt_bytes(&self, file_key: &[u8], id: ObjectId, data: &[u8]) -> Vec<u8> {
        rc4_apply(&self.object_key(file_key, id), data)
    }

    /// RC4 is symmetric, so decryption is the same transform.
    pub fn decrypt_bytes(&self, file_key: &[u8], id: ObjectId, data: &[u8]) -> Vec<u8> {
        self.encrypt_bytes(file_key, id, data)
    }
}

/// Remove the password padding from a 32-byte padded password.
fn strip_padding(padded: &[u8; 32]) -> Vec<u8> {
    for split in 0..=32 {
        if padded[split..] == PADDING[..32 - split] {
            return padded[..split].to_vec();
        }
    }
    padded.to_vec()
}
