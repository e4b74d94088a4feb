//! Encryption of the login form sent to the identity endpoint
//!
//! The endpoint expects the urlencoded form encrypted with AES-128-CBC and
//! PKCS#7 padding under a key and IV fixed by the vendor app.

use aes::Aes128;
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

const LOGIN_KEY: [u8; 16] = *b"xeNtBVqzDc6tuNTh";
const LOGIN_IV: [u8; 16] = *b"MAAAYAAAAAAAAABg";

/// Encrypt a urlencoded login form for the `x-hm-ekv: 1` endpoint
pub fn encrypt_login_form(form: &str) -> Vec<u8> {
    Aes128CbcEnc::new(&LOGIN_KEY.into(), &LOGIN_IV.into())
        .encrypt_padded_vec_mut::<Pkcs7>(form.as_bytes())
}
