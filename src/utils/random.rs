use rand::{Rng, RngCore, distr::Alphanumeric};

/// Length of generated storage file names.
pub const FILE_NAME_LEN: usize = 40;

pub fn random_file_stem() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(FILE_NAME_LEN)
        .map(char::from)
        .collect()
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::rng().fill_bytes(&mut buf);
    buf
}
