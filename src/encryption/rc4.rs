//! RC4 stream cipher.
//!
//! Used by the standard security handler for both key checks and object
//! encryption. RC4 is symmetric, so one routine encrypts and decrypts.

/// RC4 keystream state.
pub(crate) struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Run the key schedule. `key` must be non-empty.
    pub(crate) fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, val) in s.iter_mut().enumerate() {
            *val = i as u8;
        }

        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }

        Self { s, i: 0, j: 0 }
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);
        self.s.swap(self.i as usize, self.j as usize);
        let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
        self.s[k as usize]
    }

    /// XOR the keystream into `data` in place.
    pub(crate) fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

/// Encrypt or decrypt `data` with a fresh cipher keyed by `key`.
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut result = data.to_vec();
    if key.is_empty() {
        return result;
    }
    Rc4::new(key).apply_keystream(&mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            rc4_crypt(b"Key", b"Plaintext"),
            vec![0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]
        );
        assert_eq!(
            rc4_crypt(b"Wiki", b"pedia"),
            vec![0x10, 0x21, 0xBF, 0x04, 0x20]
        );
    }

    #[test]
    fn test_symmetric() {
        let ciphertext = rc4_crypt(b"testkey", b"Hello, World!");
        assert_ne!(&ciphertext[..], b"Hello, World!");
        assert_eq!(rc4_crypt(b"testkey", &ciphertext), b"Hello, World!");
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut cipher = Rc4::new(b"secret");
        let mut data = b"split across calls".to_vec();
        let (a, b) = data.split_at_mut(5);
        cipher.apply_keystream(a);
        cipher.apply_keystream(b);
        assert_eq!(data, rc4_crypt(b"secret", b"split across calls"));
    }

    #[test]
    fn test_empty_input() {
        assert!(rc4_crypt(b"testkey", b"").is_empty());
    }
}
