use crate::Ves;
use crate::error::Error;
use crate::platform::Platform;
use alloc::string::String;
use alloc::vec::Vec;

pub trait Set<T> {
    fn set(&mut self, offset: u16, value: T) -> Result<(), Error>;
}

impl<T, S: Set<T>> Set<T> for &mut S {
    fn set(&mut self, offset: u16, value: T) -> Result<(), Error> {
        (*self).set(offset, value)
    }
}

impl<T: Platform> Set<bool> for Ves<T> {
    fn set(&mut self, offset: u16, value: bool) -> Result<(), Error> {
        self.write(offset, &[value as u8])
    }
}

impl<T: Platform> Set<u8> for Ves<T> {
    fn set(&mut self, offset: u16, value: u8) -> Result<(), Error> {
        self.write(offset, &[value])
    }
}

impl<T: Platform> Set<u16> for Ves<T> {
    fn set(&mut self, offset: u16, value: u16) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u32> for Ves<T> {
    fn set(&mut self, offset: u16, value: u32) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u64> for Ves<T> {
    fn set(&mut self, offset: u16, value: u64) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i8> for Ves<T> {
    fn set(&mut self, offset: u16, value: i8) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i16> for Ves<T> {
    fn set(&mut self, offset: u16, value: i16) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i32> for Ves<T> {
    fn set(&mut self, offset: u16, value: i32) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i64> for Ves<T> {
    fn set(&mut self, offset: u16, value: i64) -> Result<(), Error> {
        self.write(offset, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<&str> for Ves<T> {
    fn set(&mut self, offset: u16, value: &str) -> Result<(), Error> {
        self.write(offset, value.as_bytes())
    }
}

impl<T: Platform> Set<&String> for Ves<T> {
    fn set(&mut self, offset: u16, value: &String) -> Result<(), Error> {
        self.write(offset, value.as_bytes())
    }
}

impl<T: Platform> Set<&[u8]> for Ves<T> {
    fn set(&mut self, offset: u16, value: &[u8]) -> Result<(), Error> {
        self.write(offset, value)
    }
}

impl<T: Platform> Set<&Vec<u8>> for Ves<T> {
    fn set(&mut self, offset: u16, value: &Vec<u8>) -> Result<(), Error> {
        self.write(offset, value)
    }
}
