//! Scalars that may be published even when the source schema does not declare them.

/// Well known custom scalars, by name.
const CATALOG: &[&str] = &[
    // numbers
    "BigInt",
    "Byte",
    "Long",
    "SafeInt",
    "NegativeFloat",
    "NegativeInt",
    "NonNegativeFloat",
    "NonNegativeInt",
    "NonPositiveFloat",
    "NonPositiveInt",
    "PositiveFloat",
    "PositiveInt",
    "UnsignedFloat",
    "UnsignedInt",
    // dates and times
    "Date",
    "Time",
    "DateTime",
    "DateTimeISO",
    "Timestamp",
    "TimeZone",
    "UtcOffset",
    "Duration",
    "ISO8601Duration",
    "LocalDate",
    "LocalTime",
    "LocalDateTime",
    "LocalEndTime",
    // identifiers
    "UUID",
    "GUID",
    "Cuid",
    "ObjectID",
    "DID",
    "JWT",
    "SemVer",
    // contact and locale
    "EmailAddress",
    "PhoneNumber",
    "PostalCode",
    "CountryCode",
    "Locale",
    "URL",
    // network
    "IP",
    "IPv4",
    "IPv6",
    "MAC",
    "Port",
    // colors and encodings
    "Hexadecimal",
    "HexColorCode",
    "HSL",
    "HSLA",
    "RGB",
    "RGBA",
    // geography
    "Latitude",
    "Longitude",
    // finance
    "Currency",
    "USCurrency",
    "IBAN",
    "RoutingNumber",
    "AccountNumber",
    // documents and classification
    "ISBN",
    "SESSN",
    "DeweyDecimal",
    "LCCSubclass",
    "IPCPatent",
    // misc
    "JSON",
    "JSONObject",
    "NonEmptyString",
    "Void",
];

pub(crate) fn is_known_scalar(name: &str) -> bool {
    CATALOG.contains(&name)
}
