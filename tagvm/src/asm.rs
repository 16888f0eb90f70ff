/// The assembler buffer: a byte flex that code generators emit into.
use std::convert::TryFrom;

use genheap::Root;

use crate::error::RuntimeError;
use crate::flex::{FlexKind, Width};
use crate::runtime::Interpreter;
use crate::value::Value;

/// Initial and minimum growth size of an assembler buffer
pub const ASM_UNIT: usize = 4096;

impl Interpreter {
    pub fn asm_new(&mut self) -> Result<Value, RuntimeError> {
        self.flex_new(FlexKind::Bytes, ASM_UNIT)
    }

    /// Emit the low `width` bytes of `value`. Widths other than a byte, a
    /// native int or a word are rejected.
    pub fn asm_put(&mut self, asm: Root, value: usize, width: usize) -> Result<(), RuntimeError> {
        let width = Width::try_from(width)?;
        self.flex_append_raw(asm, value, width)
    }

    /// Emit a run of bytes
    pub fn asm_write(&mut self, asm: Root, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.flex_ensure_capacity(asm, bytes.len())?;
        for byte in bytes {
            self.flex_append_raw(asm, *byte as usize, Width::Byte)?;
        }
        Ok(())
    }

    /// Everything emitted so far
    pub fn asm_code(&self, asm: Value) -> Result<Vec<u8>, RuntimeError> {
        self.flex_bytes(asm)
    }
}

#[cfg(test)]
mod test {
    use crate::error::ErrorKind;
    use crate::runtime::{Config, Interpreter};

    #[test]
    fn test_emit() {
        let mut interp = Interpreter::new(Config::default()).unwrap();
        let asm = interp.asm_new().unwrap();
        let root = interp.pin(asm);

        interp.asm_put(root, 0x90, 1).unwrap();
        interp.asm_write(root, &[0x48, 0x89]).unwrap();
        interp.asm_put(root, 7, 4).unwrap();

        let code = interp.asm_code(interp.value(root)).unwrap();
        assert!(code.len() == 7);
        assert!(code[..3] == [0x90, 0x48, 0x89]);
        assert!(code[3..] == 7u32.to_ne_bytes());
    }

    #[test]
    fn test_bad_width() {
        let mut interp = Interpreter::new(Config::default()).unwrap();
        let asm = interp.asm_new().unwrap();
        let root = interp.pin(asm);

        let err = interp.asm_put(root, 1, 2).unwrap_err();
        assert!(*err.error_kind() == ErrorKind::UnsupportedWidth(2));
    }

    #[test]
    fn test_grows_past_unit() {
        let mut interp = Interpreter::new(Config::default()).unwrap();
        let asm = interp.asm_new().unwrap();
        let root = interp.pin(asm);

        for i in 0..600 {
            interp.asm_put(root, i, 8).unwrap();
        }

        let asm = interp.value(root);
        assert!(interp.flex_len(asm).unwrap() == 4800);
        assert!(interp.flex_capacity(asm).unwrap() >= 8192);
        assert!(interp.flex_read(asm, 8 * 599, crate::flex::Width::Word).unwrap() == 599);
    }
}
