//! Device/browser/OS parsing from the raw client descriptor.
//!
//! Browser and OS families come from woothee; the device class comes from
//! ordered substring matching because woothee folds tablets into other
//! categories. Unrecognized descriptors degrade to `Other`/`Unknown`
//! instead of failing.

use serde::Serialize;
use woothee::parser::Parser;

pub const UNKNOWN_BROWSER: &str = "Other";
pub const UNKNOWN_OS: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResult {
    pub browser: String,
    pub os: String,
    pub device_class: DeviceClass,
}

impl Default for DeviceResult {
    fn default() -> Self {
        Self {
            browser: UNKNOWN_BROWSER.to_string(),
            os: UNKNOWN_OS.to_string(),
            device_class: DeviceClass::Desktop,
        }
    }
}

/// Ordered class detection: tablet tokens first, then mobile tokens, then
/// desktop by default. "Android without mobile" is the conventional tablet
/// signal.
fn classify_device(lowered: &str) -> DeviceClass {
    const TABLET_TOKENS: [&str; 4] = ["ipad", "tablet", "kindle", "silk"];
    const MOBILE_TOKENS: [&str; 6] = [
        "mobile",
        "iphone",
        "ipod",
        "android",
        "windows phone",
        "blackberry",
    ];

    if TABLET_TOKENS.iter().any(|t| lowered.contains(t)) {
        return DeviceClass::Tablet;
    }
    if lowered.contains("android") && !lowered.contains("mobile") {
        return DeviceClass::Tablet;
    }
    if MOBILE_TOKENS.iter().any(|t| lowered.contains(t)) {
        return DeviceClass::Mobile;
    }
    DeviceClass::Desktop
}

/// Parse a client descriptor into browser/OS families and a device class.
pub fn parse_device(descriptor: &str) -> DeviceResult {
    if descriptor.is_empty() {
        return DeviceResult::default();
    }

    let lowered = descriptor.to_lowercase();
    let device_class = classify_device(&lowered);

    let parser = Parser::new();
    let result = parser.parse(descriptor).unwrap_or_default();

    let browser = if !result.name.is_empty() && result.name != "UNKNOWN" {
        result.name.to_string()
    } else {
        UNKNOWN_BROWSER.to_string()
    };

    let os = if !result.os.is_empty() && result.os != "UNKNOWN" {
        result.os.to_string()
    } else {
        UNKNOWN_OS.to_string()
    };

    DeviceResult {
        browser,
        os,
        device_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chrome_on_windows() {
        let result = parse_device(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        );
        assert_eq!(result.browser, "Chrome");
        assert_eq!(result.os, "Windows 10");
        assert_eq!(result.device_class, DeviceClass::Desktop);
    }

    #[test]
    fn test_parse_safari_on_iphone() {
        let result = parse_device(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(result.browser, "Safari");
        assert_eq!(result.device_class, DeviceClass::Mobile);
    }

    #[test]
    fn test_ipad_is_tablet() {
        let result = parse_device(
            "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(result.device_class, DeviceClass::Tablet);
    }

    #[test]
    fn test_android_without_mobile_is_tablet() {
        let result = parse_device(
            "Mozilla/5.0 (Linux; Android 13; SM-X906C) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36",
        );
        assert_eq!(result.device_class, DeviceClass::Tablet);
    }

    #[test]
    fn test_android_phone_is_mobile() {
        let result = parse_device(
            "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        );
        assert_eq!(result.device_class, DeviceClass::Mobile);
    }

    #[test]
    fn test_unrecognized_descriptor_degrades() {
        let result = parse_device("SomethingEntirelyMadeUp/0.1");
        assert_eq!(result.browser, UNKNOWN_BROWSER);
        assert_eq!(result.os, UNKNOWN_OS);
        assert_eq!(result.device_class, DeviceClass::Desktop);
    }

    #[test]
    fn test_empty_descriptor_defaults() {
        let result = parse_device("");
        assert_eq!(result, DeviceResult::default());
    }
}
