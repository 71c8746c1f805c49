//! Passphrase-based artifact encryption.
//!
//! Argon2id derives a 256-bit key from the passphrase and a random salt;
//! AES-256-GCM encrypts the whole file under a random nonce. Output layout:
//!
//! ```text
//! | "EBK1" | salt (16) | nonce (12) | ciphertext + tag |
//! ```

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use std::path::Path;

/// Extension appended by [`encrypt_file`].
pub const ENCRYPTED_EXT: &str = ".enc";

const MAGIC: &[u8; 4] = b"EBK1";
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const HEADER_SIZE: usize = MAGIC.len() + SALT_SIZE + NONCE_SIZE;

fn crypto_error(msg: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}

/// Zeroed on drop.
struct Key([u8; 32]);

impl Drop for Key {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> std::io::Result<Key> {
    let mut key = Key([0u8; 32]);
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key.0)
        .map_err(|e| crypto_error(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

pub fn encrypt(plaintext: &[u8], passphrase: &str) -> std::io::Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| crypto_error(format!("failed to create cipher: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| crypto_error(format!("encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(data: &[u8], passphrase: &str) -> std::io::Result<Vec<u8>> {
    if data.len() < HEADER_SIZE || &data[..MAGIC.len()] != MAGIC {
        return Err(crypto_error("not an encrypted backup".to_string()));
    }
    let salt = &data[MAGIC.len()..MAGIC.len() + SALT_SIZE];
    let nonce = &data[MAGIC.len() + SALT_SIZE..HEADER_SIZE];

    let key = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| crypto_error(format!("failed to create cipher: {}", e)))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), &data[HEADER_SIZE..])
        .map_err(|_| crypto_error("decryption failed: invalid passphrase or corrupted data".to_string()))
}

/// Encrypt `src` into `dst` (mode 0600).
pub fn encrypt_file(src: &Path, dst: &Path, passphrase: &str) -> std::io::Result<()> {
    let data = std::fs::read(src)?;
    let encrypted = encrypt(&data, passphrase)?;
    crate::fs::write_private(dst, &encrypted)
}

/// Inverse of [`encrypt_file`], for verifying an artifact by hand.
pub fn decrypt_file(src: &Path, dst: &Path, passphrase: &str) -> std::io::Result<()> {
    let data = std::fs::read(src)?;
    let plaintext = decrypt(&data, passphrase)?;
    crate::fs::write_private(dst, &plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encrypt_decrypt() {
        let encrypted = encrypt(b"etcd snapshot", "s3cret").unwrap();
        assert_eq!(&encrypted[..4], b"EBK1");
        assert_eq!(decrypt(&encrypted, "s3cret").unwrap(), b"etcd snapshot");
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let a = encrypt(b"same", "pass").unwrap();
        let b = encrypt(b"same", "pass").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let encrypted = encrypt(b"etcd snapshot", "right").unwrap();
        assert!(decrypt(&encrypted, "wrong").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut encrypted = encrypt(b"etcd snapshot", "pass").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;
        assert!(decrypt(&encrypted, "pass").is_err());
    }

    #[test]
    fn test_rejects_foreign_data() {
        assert!(decrypt(b"plain tarball", "pass").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_encrypt_file_is_private() -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("a.tar.zst");
        let dst = temp_dir.path().join("a.tar.zst.enc");
        let back = temp_dir.path().join("a.tar.zst.dec");
        std::fs::write(&src, b"archive")?;

        encrypt_file(&src, &dst, "pass")?;
        assert_eq!(std::fs::metadata(&dst)?.permissions().mode() & 0o777, 0o600);

        decrypt_file(&dst, &back, "pass")?;
        assert_eq!(std::fs::read(&back)?, b"archive");
        Ok(())
    }
}
