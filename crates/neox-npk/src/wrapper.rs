//! Script wrappers found inside decoded payloads.
//!
//! Compiled scripts ship inside engine wrappers that sit above the archive's
//! own cipher and compression layers. ROTOR wraps a zlib stream in a six-rotor
//! substitution cipher keyed by a fixed string; NXS3 carries an RSA-signed
//! 32-bit seed for a rolling XOR stream. Both are removed here. STZB is only
//! recognised.

use std::io::Read;

use flate2::read::ZlibDecoder;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};

use crate::UnwrapError;

/// Engine wrapper formats recognised on decoded payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrapping {
    /// ROTOR-encrypted zlib stream, tagged by a two-byte prefix.
    Rotor,
    /// NXS3 script sealed with an RSA-signed stream key.
    Nxs3,
    /// STZB container; recognised but not unpacked.
    Stzb,
}

impl Wrapping {
    const ROTOR_TAGS: [[u8; 2]; 2] = [[0x1D, 0x04], [0x15, 0x23]];
    const NXS3_MAGIC: &'static [u8] = b"NXS3\x03\x00\x00\x01";
    const STZB_MAGIC: &'static [u8] = b"STZB";

    /// Detect a wrapper from the first bytes of a decoded payload.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(Self::NXS3_MAGIC) {
            Some(Self::Nxs3)
        } else if data.starts_with(Self::STZB_MAGIC) {
            Some(Self::Stzb)
        } else if Self::ROTOR_TAGS.iter().any(|tag| data.starts_with(tag)) {
            Some(Self::Rotor)
        } else {
            None
        }
    }

    /// Short lowercase name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rotor => "rotor",
            Self::Nxs3 => "nxs3",
            Self::Stzb => "stzb",
        }
    }

    /// Remove this wrapper from `data`.
    pub fn unpack(self, data: &[u8]) -> Result<Vec<u8>, UnwrapError> {
        match self {
            Self::Rotor => unpack_rotor(data),
            Self::Nxs3 => unpack_nxs3(data),
            Self::Stzb => Err(UnwrapError::Unsupported(self)),
        }
    }
}

const ROTOR_COUNT: usize = 6;
const ROTOR_SIZE: usize = 256;

/// Bytes at the head of an inflated ROTOR stream that are XOR-masked.
const ROTOR_MASKED_LEN: usize = 128;
const ROTOR_MASK: u8 = 0x9A;

/// Upper bound on zlib expansion (deflate cannot exceed about 1032:1).
const INFLATE_RATIO: u64 = 1032;

/// Key shared by every ROTOR-wrapped script.
pub fn rotor_key() -> Vec<u8> {
    const DN: &str = "j2h56ogodh3se";
    const DT: &str = "=dziaq.";
    const DF: &str = "|os=5v7!\"-234";

    let mut key = DN.repeat(4);
    for _ in 0..5 {
        key.push_str(DT);
        key.push_str(DN);
        key.push_str(DF);
    }
    key.push_str("!#");
    key.push_str(&DT.repeat(7));
    key.push_str(&DF.repeat(2));
    key.push_str("*&'");
    key.into_bytes()
}

/// Wichmann-Hill generator seeded from a key string.
struct WichmannHill {
    x: i64,
    y: i64,
    z: i64,
}

impl WichmannHill {
    fn from_key(key: &[u8]) -> Self {
        let (mut x, mut y, mut z) = (995i64, 576i64, 767i64);
        for &c in key {
            let c = i64::from(c);
            x = ((x << 3 | x >> 13) + c) & 0xFFFF;
            y = ((y << 3 | y >> 13) ^ c) & 0xFFFF;
            z = ((z << 3 | z >> 13) - c) & 0xFFFF;
        }

        let signed = |v: i64| if v > 0x7FFF { v - 0x1_0000 } else { v };
        let (x, y, z) = (signed(x), signed(y) | 1, signed(z));

        let mut x = 171 * x.rem_euclid(177) - 2 * x.div_euclid(177);
        let mut y = 172 * y.rem_euclid(176) - 35 * y.div_euclid(176);
        let mut z = 170 * z.rem_euclid(178) - 63 * z.div_euclid(178);
        if x < 0 {
            x += 30269;
        }
        if y < 0 {
            y += 30307;
        }
        if z < 0 {
            z += 30323;
        }
        Self { x, y, z }
    }

    /// Next value in `0..n`.
    fn next_below(&mut self, n: usize) -> usize {
        let (x, y, z) = (self.x, self.y, self.z);
        self.x = 171 * x % 30269;
        self.y = 172 * y % 30307;
        self.z = 170 * z % 30323;

        let sample = x as f64 / 30269.0 + y as f64 / 30307.0 + z as f64 / 30323.0;
        (sample * n as f64) as usize % n
    }
}

/// Decrypting half of a six-rotor substitution cipher.
pub struct Rotor {
    /// Inverse permutation of each rotor
    tables: [[u8; ROTOR_SIZE]; ROTOR_COUNT],
    /// Odd step each rotor advances by
    steps: [usize; ROTOR_COUNT],
    positions: [usize; ROTOR_COUNT],
}

impl Rotor {
    pub fn new(key: &[u8]) -> Self {
        let mut rng = WichmannHill::from_key(key);
        let mut tables = [[0u8; ROTOR_SIZE]; ROTOR_COUNT];
        let mut steps = [0usize; ROTOR_COUNT];
        let mut positions = [0usize; ROTOR_COUNT];

        for rotor in 0..ROTOR_COUNT {
            positions[rotor] = rng.next_below(ROTOR_SIZE);
            steps[rotor] = 1 + 2 * rng.next_below(ROTOR_SIZE / 2);

            let mut forward: Vec<usize> = (0..ROTOR_SIZE).collect();
            let mut inverse = forward.clone();
            let mut i = ROTOR_SIZE;
            while i > 1 {
                let r = rng.next_below(i);
                i -= 1;
                forward.swap(r, i);
                inverse[forward[i]] = i;
            }
            inverse[forward[0]] = 0;

            for (slot, &value) in tables[rotor].iter_mut().zip(&inverse) {
                *slot = value as u8;
            }
        }

        Self {
            tables,
            steps,
            positions,
        }
    }

    /// Decrypt `data`, advancing the rotors.
    pub fn decrypt(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|&byte| {
                let mut c = byte;
                for rotor in (0..ROTOR_COUNT).rev() {
                    c = self.positions[rotor] as u8 ^ self.tables[rotor][usize::from(c)];
                }

                let mut carry = 0usize;
                for rotor in 0..ROTOR_COUNT {
                    carry = ((self.positions[rotor] + usize::from(carry >= ROTOR_SIZE)) & 0xFF)
                        + self.steps[rotor];
                    self.positions[rotor] = carry % ROTOR_SIZE;
                }
                c
            })
            .collect()
    }
}

fn unpack_rotor(data: &[u8]) -> Result<Vec<u8>, UnwrapError> {
    let decrypted = Rotor::new(&rotor_key()).decrypt(data);

    let limit = (data.len() as u64).saturating_mul(INFLATE_RATIO).max(1 << 16);
    let mut inflated = Vec::new();
    ZlibDecoder::new(decrypted.as_slice())
        .take(limit + 1)
        .read_to_end(&mut inflated)?;
    if inflated.len() as u64 > limit {
        return Err(UnwrapError::TooLarge { limit });
    }

    for byte in inflated.iter_mut().take(ROTOR_MASKED_LEN) {
        *byte ^= ROTOR_MASK;
    }
    inflated.reverse();
    Ok(inflated)
}

const NXS3_HEADER_LEN: usize = 20;
const NXS3_KEY_BLOCK_LEN: usize = 128;

const NXS3_PUBLIC_KEY: &str = "-----BEGIN RSA PUBLIC KEY-----
MIGJAoGBAOZAaZe2qB7dpT9Y8WfZIdDv+ooS1HsFEDW2hFnnvcuFJ4vIuPgKhISm
pY4/jT3aipwPNVTjM6yHbzOLhrnGJh7Ec3CQG/FZu6VKoCqVEtCeh15hjcu6QYtn
YWIEf8qgkylqsOQ3IIn76udV6m0AWC2jDlmLeRcR04w9NNw7+9t9AgMBAAE=
-----END RSA PUBLIC KEY-----
";

fn unpack_nxs3(data: &[u8]) -> Result<Vec<u8>, UnwrapError> {
    let body_start = NXS3_HEADER_LEN + NXS3_KEY_BLOCK_LEN;
    if data.len() < body_start {
        return Err(UnwrapError::Truncated { len: data.len() });
    }

    let key = RsaPublicKey::from_pkcs1_pem(NXS3_PUBLIC_KEY)
        .map_err(|e| UnwrapError::PublicKey(e.to_string()))?;
    let message = recover_signed(&key, &data[NXS3_HEADER_LEN..body_start])?;

    // Shorter messages are zero-extended, as a little-endian integer would be.
    let mut seed = [0u8; 4];
    for (slot, &byte) in seed.iter_mut().zip(&message) {
        *slot = byte;
    }
    Ok(nxs3_stream(&data[body_start..], u32::from_le_bytes(seed)))
}

/// Apply the public key to a PKCS#1 v1.5 type 1 block and strip its padding.
fn recover_signed(key: &RsaPublicKey, block: &[u8]) -> Result<Vec<u8>, UnwrapError> {
    let size = key.size();
    if block.len() != size {
        return Err(UnwrapError::KeyBlock("length does not match the modulus"));
    }

    let value = BigUint::from_bytes_be(block).modpow(key.e(), key.n());
    let bytes = value.to_bytes_be();
    let mut padded = vec![0u8; size.saturating_sub(bytes.len())];
    padded.extend_from_slice(&bytes);

    if padded.len() < 2 || padded[0] != 0x00 || padded[1] != 0x01 {
        return Err(UnwrapError::KeyBlock("incorrect padding"));
    }
    let end = padded[2..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(UnwrapError::KeyBlock("padding is not terminated"))?;
    Ok(padded[2 + end + 1..].to_vec())
}

/// Rolling XOR keyed by a 32-bit seed that is remixed after every fourth byte.
pub fn nxs3_stream(data: &[u8], mut key: u32) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, &byte)| {
            let out = byte ^ (key >> (i % 4 * 8)) as u8;
            if i % 4 == 3 {
                let ror = key.rotate_right(19);
                key = ror.wrapping_add(ror << 2).wrapping_add(0xE654_6B64);
            }
            out
        })
        .collect()
}
