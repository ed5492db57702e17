//! Naming of the prebuilt renderer binaries shipped per platform.

use std::fmt;

/// Operating system / architecture pair a renderer binary is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub system: System,
    pub arch: Arch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum System {
    Darwin,
    Windows,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Arm,
    X86,
}

impl Platform {
    /// The platform this host was compiled for.
    pub fn current() -> Self {
        Self::from_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's `OS`/`ARCH` constants onto the release naming scheme.
    ///
    /// Anything that is not macOS or Windows is treated as Linux, and ARM
    /// builds only exist for Darwin and Linux.
    pub fn from_consts(os: &str, arch: &str) -> Self {
        let system = match os {
            "macos" => System::Darwin,
            "windows" => System::Windows,
            _ => System::Linux,
        };
        let arch = if system != System::Windows && (arch.starts_with("arm") || arch == "aarch64")
        {
            Arch::Arm
        } else {
            Arch::X86
        };
        Self { system, arch }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            System::Darwin => "darwin",
            System::Windows => "windows",
            System::Linux => "linux",
        })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Arch::Arm => "arm",
            Arch::X86 => "x86",
        })
    }
}

/// File name of the renderer binary for `platform`, e.g. `linux-x86-64-webview`.
pub fn binary_name(platform: Platform) -> String {
    let suffix = if platform.system == System::Windows {
        ".exe"
    } else {
        ""
    };
    format!("{}-{}-64-webview{suffix}", platform.system, platform.arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_x86_name() {
        let platform = Platform::from_consts("linux", "x86_64");
        assert_eq!(binary_name(platform), "linux-x86-64-webview");
    }

    #[test]
    fn darwin_arm_name() {
        let platform = Platform::from_consts("macos", "aarch64");
        assert_eq!(binary_name(platform), "darwin-arm-64-webview");
    }

    #[test]
    fn windows_is_always_x86_with_exe() {
        let platform = Platform::from_consts("windows", "aarch64");
        assert_eq!(binary_name(platform), "windows-x86-64-webview.exe");
    }

    #[test]
    fn unknown_os_falls_back_to_linux() {
        let platform = Platform::from_consts("freebsd", "x86_64");
        assert_eq!(platform.system, System::Linux);
    }
}
