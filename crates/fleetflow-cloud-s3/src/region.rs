//! Region and addressing helpers

/// S3 location constraint for an EC2 region name.
///
/// Location names are identical to region names except for the two oldest
/// regions: `us-east-1` has no location constraint and `eu-west-1` reports
/// the legacy `EU`.
pub fn region_to_s3_location(region: &str) -> &str {
    match region {
        "eu-west-1" => "EU",
        "us-east-1" => "",
        other => other,
    }
}

/// Whether a region name is syntactically usable to build an endpoint
pub fn is_valid_region(region: &str) -> bool {
    !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !region.starts_with('-')
        && !region.ends_with('-')
}

/// How the bucket name is placed in request URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingStyle {
    /// `https://<bucket>.s3.<region>.amazonaws.com/<key>`
    VirtualHost,
    /// `https://s3.<region>.amazonaws.com/<bucket>/<key>`
    Path,
}

impl AddressingStyle {
    /// Dotted bucket names break the `*.s3` wildcard certificate under
    /// virtual-host addressing, so they are addressed by path.
    pub fn for_bucket(bucket_name: &str) -> Self {
        if bucket_name.contains('.') {
            AddressingStyle::Path
        } else {
            AddressingStyle::VirtualHost
        }
    }

    pub fn is_path(self) -> bool {
        self == AddressingStyle::Path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_to_s3_location() {
        assert_eq!(region_to_s3_location("eu-west-1"), "EU");
        assert_eq!(region_to_s3_location("us-east-1"), "");
        assert_eq!(region_to_s3_location("ap-northeast-1"), "ap-northeast-1");
        assert_eq!(region_to_s3_location("us-west-2"), "us-west-2");
    }

    #[test]
    fn test_is_valid_region() {
        assert!(is_valid_region("eu-central-1"));
        assert!(!is_valid_region(""));
        assert!(!is_valid_region("EU West"));
        assert!(!is_valid_region("-us-east-1"));
    }

    #[test]
    fn test_addressing_style() {
        assert_eq!(
            AddressingStyle::for_bucket("assets.example.com"),
            AddressingStyle::Path
        );
        assert_eq!(
            AddressingStyle::for_bucket("my-assets"),
            AddressingStyle::VirtualHost
        );
        assert!(AddressingStyle::for_bucket("a.b").is_path());
    }
}
