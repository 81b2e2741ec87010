// Cryptographic primitives.

pub mod password;
pub mod random;
pub mod symmetric;
pub mod totp;

pub use password::{hash_password, verify_password};
pub use random::{generate_random_string, generate_totp_secret};
pub use symmetric::{
    constant_time_equal, make_signature, symmetric_decrypt, symmetric_encrypt, verify_signature,
};
pub use totp::{base32_decode, base32_encode, build_otpauth_uri, generate_totp, verify_totp, TotpConfig};
