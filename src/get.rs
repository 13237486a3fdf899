//! The `Get<T>` trait and its implementation in this module allows providing a single generic,
//! overloaded function `get<T>()` for all supported types of the driver.

use crate::Ves;
use crate::error::Error;
use crate::platform::Platform;
use alloc::string::String;
use alloc::vec::Vec;

pub trait Get<T> {
    fn get(&mut self, offset: u16) -> Result<T, Error>;
}

impl<T, G: Get<T>> Get<T> for &mut G {
    fn get(&mut self, offset: u16) -> Result<T, Error> {
        (*self).get(offset)
    }
}

impl<T: Platform> Ves<T> {
    fn get_value(&mut self, offset: u16) -> Result<Vec<u8>, Error> {
        if offset >= self.geometry.cell_count {
            return Err(Error::AddressOutOfRange);
        }
        self.load_payload(offset)?.ok_or(Error::NotFound)
    }

    fn get_primitive<const N: usize>(&mut self, offset: u16) -> Result<[u8; N], Error> {
        let value = self.get_value(offset)?;
        value.as_slice().try_into().map_err(|_| Error::SizeMismatch {
            expected: N,
            found: value.len(),
        })
    }
}

impl<T: Platform> Get<bool> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<bool, Error> {
        let [value] = self.get_primitive::<1>(offset)?;
        Ok(value != 0)
    }
}

impl<T: Platform> Get<u8> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<u8, Error> {
        let [value] = self.get_primitive::<1>(offset)?;
        Ok(value)
    }
}

impl<T: Platform> Get<u16> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<u32> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<u64> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<i8> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<i8, Error> {
        Ok(i8::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<i16> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<i32> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<i64> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.get_primitive(offset)?))
    }
}

impl<T: Platform> Get<String> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<String, Error> {
        String::from_utf8(self.get_value(offset)?).map_err(|_| Error::CorruptedData)
    }
}

impl<T: Platform> Get<Vec<u8>> for Ves<T> {
    fn get(&mut self, offset: u16) -> Result<Vec<u8>, Error> {
        self.get_value(offset)
    }
}
