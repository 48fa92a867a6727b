// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Random identifiers: document IDs and share codes.

use crate::error::AppError;
use ring::rand::{SecureRandom, SystemRandom};

/// Share code alphabet (uppercase letters and digits).
pub const SHARE_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const DOCUMENT_ID_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated document IDs (matches Firestore auto-IDs).
const DOCUMENT_ID_LENGTH: usize = 20;

/// Draw `len` symbols uniformly from `alphabet`.
fn random_string(rng: &SystemRandom, alphabet: &[u8], len: usize) -> Result<String, AppError> {
    // Largest multiple of the alphabet size below 256; bytes above it are
    // rejected so every symbol is equally likely.
    let limit = 256 - (256 % alphabet.len());
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];

    while out.len() < len {
        rng.fill(&mut buf)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        for &b in buf.iter().filter(|&&b| (b as usize) < limit) {
            if out.len() == len {
                break;
            }
            out.push(alphabet[b as usize % alphabet.len()] as char);
        }
    }
    Ok(out)
}

/// New random document ID.
pub fn new_document_id(rng: &SystemRandom) -> Result<String, AppError> {
    random_string(rng, DOCUMENT_ID_ALPHABET, DOCUMENT_ID_LENGTH)
}

/// New random share code of `len` characters.
pub fn new_share_code(rng: &SystemRandom, len: usize) -> Result<String, AppError> {
    random_string(rng, SHARE_CODE_ALPHABET, len)
}
