use rand::{distr::Alphanumeric, Rng};

pub const REFERRAL_CODE_LEN: usize = 8;

/// Random uppercase alphanumeric code handed out at registration.
pub fn generate() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}
