//! `PSU-*` headers used by banks for fraud detection.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

const MAX_HEADER_LENGTH: usize = 50;

/// Request information keys forwarded unchanged as `PSU-<key>`.
const FORWARDED_HEADERS: [&str; 6] = [
    "User-Agent",
    "Referer",
    "Accept",
    "Accept-Charset",
    "Accept-Encoding",
    "Accept-Language",
];

/// Builds the `PSU-*` headers from the PSU's request information.
pub fn psu_headers(information: &BTreeMap<String, String>) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();

    if let Some(ip) = lookup(information, "IP-Address") {
        let ip: Ipv4Addr = ip
            .parse()
            .map_err(|_| Error::InvalidInput(format!("PSU IP address must be IPv4: {}", ip)))?;
        headers.push(("PSU-IP-Address".to_string(), ip.to_string()));
    }

    if let Some(port) = lookup(information, "IP-Port") {
        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid PSU IP port: {}", port)))?;
        headers.push(("PSU-IP-Port".to_string(), port.to_string()));
    }

    if let Some(method) = lookup(information, "HTTP-Method") {
        headers.push(("PSU-HTTP-Method".to_string(), method.to_uppercase()));
    }

    if let Some(date) = lookup(information, "Date") {
        headers.push(("PSU-Date".to_string(), iso_date(date)?));
    }

    for name in FORWARDED_HEADERS {
        if let Some(value) = lookup(information, name) {
            headers.push((format!("PSU-{}", name), truncate(value)));
        }
    }

    Ok(headers)
}

fn lookup<'a>(information: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    information
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}

fn iso_date(value: &str) -> Result<String> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.to_rfc3339());
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Ok(date.to_rfc3339());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|date| date.format("%Y-%m-%dT%H:%M:%S").to_string())
        .map_err(|_| Error::InvalidInput(format!("Invalid PSU date: {}", value)))
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_HEADER_LENGTH {
        return value.to_string();
    }
    let kept: String = value.chars().take(MAX_HEADER_LENGTH - 3).collect();
    format!("{}...", kept)
}
