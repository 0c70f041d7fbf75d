//! Vulnerability scan data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Relative weight used when measuring remediation coverage.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 10.0,
            Severity::High => 5.0,
            Severity::Medium => 2.0,
            Severity::Low => 1.0,
            Severity::Unknown => 0.5,
        }
    }
}

/// One finding reported by an image scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub id: String,
    pub severity: Severity,
    pub package: String,
    pub installed_version: String,
    pub fixed_version: Option<String>,
}

impl Vulnerability {
    pub fn is_fixable(&self) -> bool {
        self.fixed_version.is_some()
    }
}

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub total: u32,
}

impl ScanSummary {
    pub fn from_vulnerabilities(vulns: &[Vulnerability]) -> Self {
        let mut summary = ScanSummary::default();
        for v in vulns {
            match v.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low | Severity::Unknown => summary.low += 1,
            }
        }
        summary.total = vulns.len() as u32;
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(id: &str, severity: Severity) -> Vulnerability {
        Vulnerability {
            id: id.to_string(),
            severity,
            package: "openssl".to_string(),
            installed_version: "3.0.1".to_string(),
            fixed_version: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = ScanSummary::from_vulnerabilities(&[
            vuln("CVE-1", Severity::Critical),
            vuln("CVE-2", Severity::High),
            vuln("CVE-3", Severity::High),
            vuln("CVE-4", Severity::Unknown),
        ]);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.high, 2);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.total, 4);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low > Severity::Unknown);
    }
}
