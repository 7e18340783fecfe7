//! Encrypted root key storage.
//!
//! The root key is sealed with Argon2id key derivation + AES-256-GCM. The
//! sealed form carries every parameter needed to open it except the
//! password.

use crate::error::WalletError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use std::path::Path;

/// Magic bytes identifying a sealed root key.
const MAGIC: &[u8; 4] = b"ADAK";

const VERSION: u8 = 1;

/// Header size: 4 (magic) + 1 (version) + 32 (salt) + 12 (nonce) = 49 bytes.
const HEADER_SIZE: usize = 49;

const ARGON2_T_COST: u32 = 3;
const ARGON2_M_COST: u32 = 65536; // 64 MiB
const ARGON2_PARALLELISM: u32 = 4;
const KEY_LEN: usize = 32;

fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], WalletError> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_PARALLELISM, Some(KEY_LEN))
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let mut out = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(out)
}

/// Seal `root_key` under `password`.
#[allow(deprecated)] // aes-gcm 0.10 uses generic-array 0.x
pub fn seal_root_key(root_key: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; 32];
    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), root_key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut output = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.push(VERSION);
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Open a sealed root key. A wrong password is `DecryptionFailed`.
#[allow(deprecated)]
pub fn open_root_key(sealed: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    if sealed.len() <= HEADER_SIZE {
        return Err(WalletError::InvalidFile("sealed key too short".into()));
    }
    if &sealed[0..4] != MAGIC {
        return Err(WalletError::InvalidFile("invalid magic bytes".into()));
    }
    let version = sealed[4];
    if version != VERSION {
        return Err(WalletError::InvalidFile(format!("unsupported version: {}", version)));
    }

    let salt = &sealed[5..37];
    let nonce_bytes = &sealed[37..49];
    let ciphertext = &sealed[49..];

    let key_bytes = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| WalletError::DecryptionFailed)
}

/// Change the password of a sealed key.
pub fn reseal_root_key(sealed: &[u8], old_password: &[u8], new_password: &[u8]) -> Result<Vec<u8>, WalletError> {
    let root_key = open_root_key(sealed, old_password)?;
    seal_root_key(&root_key, new_password)
}

pub fn is_sealed_key(data: &[u8]) -> bool {
    data.len() > HEADER_SIZE && &data[0..4] == MAGIC
}

/// Sealed root key persisted in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    sealed: Vec<u8>,
}

impl KeyStore {
    pub fn create(root_key: &[u8], password: &[u8]) -> Result<Self, WalletError> {
        Ok(Self {
            sealed: seal_root_key(root_key, password)?,
        })
    }

    pub fn from_sealed(sealed: Vec<u8>) -> Result<Self, WalletError> {
        if !is_sealed_key(&sealed) {
            return Err(WalletError::InvalidFile("not a sealed key".into()));
        }
        Ok(Self { sealed })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        Self::from_sealed(std::fs::read(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WalletError> {
        std::fs::write(path, &self.sealed)?;
        Ok(())
    }

    pub fn sealed(&self) -> &[u8] {
        &self.sealed
    }

    pub fn unlock(&self, password: &[u8]) -> Result<Vec<u8>, WalletError> {
        open_root_key(&self.sealed, password)
    }

    pub fn change_password(&mut self, old_password: &[u8], new_password: &[u8]) -> Result<(), WalletError> {
        self.sealed = reseal_root_key(&self.sealed, old_password, new_password)?;
        Ok(())
    }
}
