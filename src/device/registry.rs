//! Read-only access to `HKEY_LOCAL_MACHINE`
//!
//! Hyper-V emulators publish their ports and install paths here.

/// A registry value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    Dword(u32),
    String(String),
}

impl RegistryValue {
    /// Interpret the value as a TCP port
    pub fn as_port(&self) -> Option<u16> {
        match self {
            RegistryValue::Dword(n) => u16::try_from(*n).ok(),
            RegistryValue::String(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            RegistryValue::Dword(n) => n.to_string(),
            RegistryValue::String(s) => s.clone(),
        }
    }
}

/// Lookup of `name` under the `HKEY_LOCAL_MACHINE\<key_path>` key
pub trait Registry {
    fn query_value(&self, key_path: &str, name: &str) -> Option<RegistryValue>;
}

/// The registry of the running system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegistry;

#[cfg(target_os = "windows")]
impl Registry for SystemRegistry {
    fn query_value(&self, key_path: &str, name: &str) -> Option<RegistryValue> {
        use windows::core::HSTRING;
        use windows::Win32::Foundation::ERROR_SUCCESS;
        use windows::Win32::System::Registry::{
            RegGetValueW, HKEY_LOCAL_MACHINE, REG_DWORD, REG_SZ, REG_VALUE_TYPE, RRF_RT_REG_DWORD,
            RRF_RT_REG_SZ,
        };

        let key = HSTRING::from(key_path);
        let value = HSTRING::from(name);
        let mut kind = REG_VALUE_TYPE::default();
        let mut size: u32 = 0;

        // First call sizes the buffer
        let status = unsafe {
            RegGetValueW(
                HKEY_LOCAL_MACHINE,
                &key,
                &value,
                RRF_RT_REG_DWORD | RRF_RT_REG_SZ,
                Some(&mut kind as *mut REG_VALUE_TYPE),
                None,
                Some(&mut size as *mut u32),
            )
        };
        if status != ERROR_SUCCESS {
            log::debug!("Registry value {key_path}\\{name} not found: {status:?}");
            return None;
        }

        let mut buffer = vec![0u8; size as usize];
        let status = unsafe {
            RegGetValueW(
                HKEY_LOCAL_MACHINE,
                &key,
                &value,
                RRF_RT_REG_DWORD | RRF_RT_REG_SZ,
                Some(&mut kind as *mut REG_VALUE_TYPE),
                Some(buffer.as_mut_ptr().cast()),
                Some(&mut size as *mut u32),
            )
        };
        if status != ERROR_SUCCESS {
            log::debug!("Registry value {key_path}\\{name} unreadable: {status:?}");
            return None;
        }
        buffer.truncate(size as usize);

        if kind == REG_DWORD {
            let bytes: [u8; 4] = buffer.get(..4)?.try_into().ok()?;
            Some(RegistryValue::Dword(u32::from_le_bytes(bytes)))
        } else if kind == REG_SZ {
            let wide: Vec<u16> = buffer
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .take_while(|&c| c != 0)
                .collect();
            Some(RegistryValue::String(String::from_utf16_lossy(&wide)))
        } else {
            None
        }
    }
}

#[cfg(not(target_os = "windows"))]
impl Registry for SystemRegistry {
    fn query_value(&self, key_path: &str, name: &str) -> Option<RegistryValue> {
        log::debug!("No registry on this platform, {key_path}\\{name} treated as missing");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_port() {
        assert_eq!(RegistryValue::Dword(5555).as_port(), Some(5555));
        assert_eq!(RegistryValue::Dword(70000).as_port(), None);
        assert_eq!(RegistryValue::String(" 5565 ".into()).as_port(), Some(5565));
        assert_eq!(RegistryValue::String("abc".into()).as_port(), None);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_system_registry_is_empty() {
        assert!(SystemRegistry
            .query_value(r"SOFTWARE\BlueStacks_nxt", "UserDefinedDir")
            .is_none());
    }
}
