use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::interfaces::dispatcher::DispatchError;

/// The client format a subscription is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFormat {
    /// Plain or base64-wrapped URI list
    Generic,
    Stash,
    SingBox,
    SingBoxLegacy,
    Mihomo,
    Clash,
    V2RayJson,
}

bitflags! {
    /// Set of client formats able to load a protocol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatSupport: u8 {
        const GENERIC = 1 << 0;
        const STASH = 1 << 1;
        const SINGBOX = 1 << 2;
        const SINGBOX_LEGACY = 1 << 3;
        const MIHOMO = 1 << 4;
        const CLASH = 1 << 5;
        const V2RAY_JSON = 1 << 6;

        const SINGBOX_ALL = Self::SINGBOX.bits() | Self::SINGBOX_LEGACY.bits();
    }
}

impl ClientFormat {
    pub const ALL: [ClientFormat; 7] = [
        ClientFormat::Generic,
        ClientFormat::Stash,
        ClientFormat::SingBox,
        ClientFormat::SingBoxLegacy,
        ClientFormat::Mihomo,
        ClientFormat::Clash,
        ClientFormat::V2RayJson,
    ];

    /// Convert a path token to a format. Tokens are matched exactly.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "generic" => Some(ClientFormat::Generic),
            "stash" => Some(ClientFormat::Stash),
            "singbox" => Some(ClientFormat::SingBox),
            "singbox-legacy" => Some(ClientFormat::SingBoxLegacy),
            "mihomo" => Some(ClientFormat::Mihomo),
            "clash" => Some(ClientFormat::Clash),
            "v2ray-json" => Some(ClientFormat::V2RayJson),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            ClientFormat::Generic => "generic",
            ClientFormat::Stash => "stash",
            ClientFormat::SingBox => "singbox",
            ClientFormat::SingBoxLegacy => "singbox-legacy",
            ClientFormat::Mihomo => "mihomo",
            ClientFormat::Clash => "clash",
            ClientFormat::V2RayJson => "v2ray-json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ClientFormat::Generic => "text/plain; charset=utf-8",
            ClientFormat::Stash | ClientFormat::Mihomo | ClientFormat::Clash => {
                "text/yaml; charset=utf-8"
            }
            ClientFormat::SingBox | ClientFormat::SingBoxLegacy | ClientFormat::V2RayJson => {
                "application/json; charset=utf-8"
            }
        }
    }

    /// The capability bit protocols must carry to be rendered in this format.
    pub fn support_flag(self) -> FormatSupport {
        match self {
            ClientFormat::Generic => FormatSupport::GENERIC,
            ClientFormat::Stash => FormatSupport::STASH,
            ClientFormat::SingBox => FormatSupport::SINGBOX,
            ClientFormat::SingBoxLegacy => FormatSupport::SINGBOX_LEGACY,
            ClientFormat::Mihomo => FormatSupport::MIHOMO,
            ClientFormat::Clash => FormatSupport::CLASH,
            ClientFormat::V2RayJson => FormatSupport::V2RAY_JSON,
        }
    }
}

impl fmt::Display for ClientFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ClientFormat {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientFormat::from_token(s).ok_or_else(|| DispatchError::UnsupportedFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip() {
        for format in ClientFormat::ALL {
            assert_eq!(ClientFormat::from_token(format.token()), Some(format));
        }
    }

    #[test]
    fn test_unknown_tokens() {
        assert_eq!(ClientFormat::from_token("json"), None);
        assert_eq!(ClientFormat::from_token("Clash"), None);
        assert_eq!(ClientFormat::from_token(""), None);
        assert!("surge".parse::<ClientFormat>().is_err());
    }

    #[test]
    fn test_support_flags_are_distinct() {
        let mut seen = FormatSupport::empty();
        for format in ClientFormat::ALL {
            assert!(!seen.intersects(format.support_flag()));
            seen |= format.support_flag();
        }
        assert_eq!(seen, FormatSupport::all());
    }
}
