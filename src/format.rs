use crate::error::{Result, ScannerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Barcode symbologies the decoder can be asked to recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    Aztec,
    Codabar,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "CODE_128")]
    Code128,
    DataMatrix,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "EAN_13")]
    Ean13,
    Itf,
    Maxicode,
    #[serde(rename = "PDF_417")]
    Pdf417,
    QrCode,
    #[serde(rename = "RSS_14")]
    Rss14,
    RssExpanded,
    UpcA,
    UpcE,
    UpcEanExtension,
}

impl BarcodeFormat {
    /// Stacked and matrix codes
    pub fn is_two_dimensional(&self) -> bool {
        TWO_DIMENSIONAL_FORMATS.contains(self)
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Maxicode => "MAXICODE",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::Rss14 => "RSS_14",
            BarcodeFormat::RssExpanded => "RSS_EXPANDED",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::UpcEanExtension => "UPC_EAN_EXTENSION",
        };
        f.write_str(name)
    }
}

pub const ALL_FORMATS: [BarcodeFormat; 17] = [
    BarcodeFormat::Aztec,
    BarcodeFormat::Codabar,
    BarcodeFormat::Code39,
    BarcodeFormat::Code93,
    BarcodeFormat::Code128,
    BarcodeFormat::DataMatrix,
    BarcodeFormat::Ean8,
    BarcodeFormat::Ean13,
    BarcodeFormat::Itf,
    BarcodeFormat::Maxicode,
    BarcodeFormat::Pdf417,
    BarcodeFormat::QrCode,
    BarcodeFormat::Rss14,
    BarcodeFormat::RssExpanded,
    BarcodeFormat::UpcA,
    BarcodeFormat::UpcE,
    BarcodeFormat::UpcEanExtension,
];

pub const ONE_DIMENSIONAL_FORMATS: [BarcodeFormat; 12] = [
    BarcodeFormat::Codabar,
    BarcodeFormat::Code39,
    BarcodeFormat::Code93,
    BarcodeFormat::Code128,
    BarcodeFormat::Ean8,
    BarcodeFormat::Ean13,
    BarcodeFormat::Itf,
    BarcodeFormat::Rss14,
    BarcodeFormat::RssExpanded,
    BarcodeFormat::UpcA,
    BarcodeFormat::UpcE,
    BarcodeFormat::UpcEanExtension,
];

pub const TWO_DIMENSIONAL_FORMATS: [BarcodeFormat; 5] = [
    BarcodeFormat::Aztec,
    BarcodeFormat::DataMatrix,
    BarcodeFormat::Maxicode,
    BarcodeFormat::Pdf417,
    BarcodeFormat::QrCode,
];

/// Non-empty, ordered, duplicate-free set of formats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSet(Vec<BarcodeFormat>);

impl FormatSet {
    /// Build a set from any list of formats; duplicates keep their first position.
    pub fn new<I>(formats: I) -> Result<Self>
    where
        I: IntoIterator<Item = BarcodeFormat>,
    {
        let mut unique = Vec::new();
        for format in formats {
            if !unique.contains(&format) {
                unique.push(format);
            }
        }

        if unique.is_empty() {
            return Err(ScannerError::invalid_formats(
                "at least one barcode format is required",
            ));
        }

        Ok(Self(unique))
    }

    pub fn single(format: BarcodeFormat) -> Self {
        Self(vec![format])
    }

    pub fn all() -> Self {
        Self(ALL_FORMATS.to_vec())
    }

    pub fn one_dimensional() -> Self {
        Self(ONE_DIMENSIONAL_FORMATS.to_vec())
    }

    pub fn two_dimensional() -> Self {
        Self(TWO_DIMENSIONAL_FORMATS.to_vec())
    }

    pub fn contains(&self, format: BarcodeFormat) -> bool {
        self.0.contains(&format)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BarcodeFormat> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[BarcodeFormat] {
        &self.0
    }
}

impl Default for FormatSet {
    fn default() -> Self {
        Self::all()
    }
}

impl From<BarcodeFormat> for FormatSet {
    fn from(format: BarcodeFormat) -> Self {
        Self::single(format)
    }
}

impl<'de> Deserialize<'de> for FormatSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let formats = Vec::<BarcodeFormat>::deserialize(deserializer)?;
        FormatSet::new(formats).map_err(serde::de::Error::custom)
    }
}
