//! `s1`/AES-CMAC salt generation.
//!
//! Network and application key derivation, message encryption and the rest
//! of the Bluetooth Mesh cryptographic toolbox are the crypto layer's
//! concern and live outside this crate. The single primitive kept here is
//! `s1`, needed to derive a virtual address's 16-bit form from its Label
//! UUID (see `address::virtual_address::LabelUuid`).

use cmac::crypto_mac::{InvalidKeyLength, Key, Output};
use cmac::{Cmac, Mac, NewMac};
use aes::Aes128;

pub const ZERO: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

pub fn s1(input: &[u8]) -> Result<Output<Cmac<Aes128>>, InvalidKeyLength> {
    aes_cmac(&ZERO, input)
}

pub fn aes_cmac(key: &[u8], input: &[u8]) -> Result<Output<Cmac<Aes128>>, InvalidKeyLength> {
    let key = Key::<Cmac<Aes128>>::from_slice(key);
    let mut mac = Cmac::<Aes128>::new(key);
    mac.update(input);
    Ok(mac.finalize())
}

#[cfg(test)]
mod tests {
    #[test]
    pub fn s1() {
        // Bluetooth Mesh Profile 8.1.1 s1 SALT generation function test vector.
        let result = super::s1(b"test").unwrap();

        assert_eq!(
            &*result.into_bytes(),
            [
                0xb7, 0x3c, 0xef, 0xbd, 0x64, 0x1e, 0xf2, 0xea, 0x59, 0x8c, 0x2b, 0x6e, 0xfb, 0x62,
                0xf7, 0x9c
            ]
        );
    }
}
