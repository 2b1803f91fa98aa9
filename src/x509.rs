//! Types common to all things X.509.

use std::{error, fmt, io, ops};
use std::convert::Infallible;
use std::str::FromStr;
use std::time::SystemTime;
use bcder::{decode, encode};
use bcder::{BitString, Captured, Mode, Oid, Tag};
use bcder::decode::{Content, ContentError, DecodeError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use chrono::{Datelike, DateTime, TimeDelta, Timelike, TimeZone, Utc};
use crate::crypto::{PublicKey, Signature, SignatureAlgorithm};
use crate::crypto::keys::SignatureVerificationError;
use crate::error::VerificationError;
use crate::oid;
use crate::util::hex::Hex;


//------------ Functions -----------------------------------------------------

/// Decodes a DER encoded source that must hold exactly one value.
///
/// Anything left in `source` after `op` returns is an error.
pub fn decode_complete<S, F, T>(
    source: S, op: F
) -> Result<T, DecodeError<<S::Source as Source>::Error>>
where
    S: IntoSource,
    F: FnOnce(
        &mut decode::Constructed<S::Source>
    ) -> Result<T, DecodeError<<S::Source as Source>::Error>>
{
    Mode::Der.decode(source, |cons| {
        let res = op(cons)?;
        if cons.skip_one()?.is_some() {
            return Err(cons.content_err("trailing data"))
        }
        Ok(res)
    })
}


//------------ Name ----------------------------------------------------------

/// A distinguished name.
///
/// The name is kept in its encoded form. Two names are equal if their
/// encodings are identical, which is the comparison CMS uses when matching
/// an issuer and serial number to a certificate.
#[derive(Clone, Debug)]
pub struct Name(Captured);

impl Name {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.capture(|cons| {
            cons.take_sequence(|cons| { // RDNSequence
                while let Some(()) = cons.take_opt_set(|cons| {
                    let mut empty_set = true;
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        empty_set = false;
                        Oid::skip_in(cons)?;
                        if cons.skip_one()?.is_none() {
                            return Err(cons.content_err(
                                "invalid name"
                            ))
                        }
                        Ok(())
                    })? { }
                    if empty_set {
                        return Err(cons.content_err(
                            "empty relative distinguished name"
                        ));
                    }
                    Ok(())
                })? { }
                Ok(())
            })
        }).map(Name)
    }

    /// Returns the encoded name.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.0
    }

    /// Returns the value of the first common name attribute.
    pub fn common_name(&self) -> Option<String> {
        self.attributes().ok()?.into_iter().flatten().find(|atv| {
            atv.oid == oid::AT_COMMON_NAME
        }).and_then(|atv| atv.to_text())
    }

    /// Returns the relative distinguished names in order of encoding.
    fn attributes(
        &self
    ) -> Result<Vec<Vec<NameAttribute>>, DecodeError<Infallible>> {
        self.0.clone().decode(|cons| {
            cons.take_sequence(|cons| {
                let mut res = Vec::new();
                while let Some(rdn) = cons.take_opt_set(|cons| {
                    let mut rdn = Vec::new();
                    while let Some(atv) = cons.take_opt_sequence(|cons| {
                        let oid = Oid::take_from(cons)?;
                        let raw = cons.capture_one()?;
                        let (tag, content) = raw.clone().decode(|cons| {
                            cons.take_value(|tag, content| {
                                match *content {
                                    Content::Primitive(ref mut prim) => {
                                        Ok((tag, prim.take_all()?))
                                    }
                                    Content::Constructed(ref mut cons) => {
                                        cons.skip_all()?;
                                        Ok((tag, Bytes::new()))
                                    }
                                }
                            })
                        }).map_err(DecodeError::convert)?;
                        Ok(NameAttribute { oid, tag, content, raw })
                    })? {
                        rdn.push(atv)
                    }
                    Ok(rdn)
                })? {
                    res.push(rdn)
                }
                Ok(res)
            })
        })
    }
}


//--- PartialEq and Eq

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for Name {}


//--- Display

/// Formats the name similar to RFC 2253.
///
/// The relative distinguished names are printed in reverse order, with
/// well-known attribute types by their short name. Values that aren’t
/// strings and attributes of unknown type are printed as the dotted
/// object identifier followed by the hex encoded value.
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rdns = match self.attributes() {
            Ok(rdns) => rdns,
            Err(_) => return write!(f, "#{}", Hex(self.as_slice())),
        };
        for (idx, rdn) in rdns.iter().rev().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            for (idx, atv) in rdn.iter().enumerate() {
                if idx > 0 {
                    f.write_str("+")?;
                }
                fmt::Display::fmt(&atv, f)?;
            }
        }
        Ok(())
    }
}


//------------ NameAttribute -------------------------------------------------

/// A single attribute type and value of a name.
#[derive(Clone, Debug)]
struct NameAttribute {
    oid: Oid<Bytes>,
    tag: Tag,
    content: Bytes,
    raw: Captured,
}

impl NameAttribute {
    /// The short names of the attribute types we know.
    const SHORT_NAMES: &'static [(&'static [u8], &'static str)] = &[
        (&[85, 4, 3], "CN"),
        (&[85, 4, 5], "SERIALNUMBER"),
        (&[85, 4, 6], "C"),
        (&[85, 4, 7], "L"),
        (&[85, 4, 8], "ST"),
        (&[85, 4, 9], "STREET"),
        (&[85, 4, 10], "O"),
        (&[85, 4, 11], "OU"),
        (&[85, 4, 17], "POSTALCODE"),
    ];

    fn short_name(&self) -> Option<&'static str> {
        Self::SHORT_NAMES.iter().find_map(|(oid, name)| {
            if self.oid.as_ref() == *oid { Some(*name) }
            else { None }
        })
    }

    /// Returns the value as text if it is one of the string types.
    fn to_text(&self) -> Option<String> {
        if self.tag == Tag::UTF8_STRING
            || self.tag == Tag::PRINTABLE_STRING
            || self.tag == Tag::IA5_STRING
            || self.tag == Tag::TELETEX_STRING
        {
            String::from_utf8(self.content.to_vec()).ok()
        }
        else if self.tag == Tag::BMP_STRING {
            if self.content.len() % 2 != 0 {
                return None
            }
            let chars = self.content.chunks(2).map(|ch| {
                u16::from_be_bytes([ch[0], ch[1]])
            });
            char::decode_utf16(chars).collect::<Result<String, _>>().ok()
        }
        else {
            None
        }
    }
}

impl fmt::Display for NameAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name_text = (self.short_name(), self.to_text());
        if let (Some(name), Some(text)) = name_text {
            f.write_str(name)?;
            f.write_str("=")?;
            for (idx, ch) in text.chars().enumerate() {
                let escape = match ch {
                    ',' | '+' | '"' | '\\' | '<' | '>' | ';' => true,
                    ' ' => idx == 0 || idx + 1 == text.chars().count(),
                    '#' => idx == 0,
                    _ => false,
                };
                if escape {
                    f.write_str("\\")?;
                }
                write!(f, "{}", ch)?;
            }
            Ok(())
        }
        else {
            write!(f, "{}=#{}", self.oid, Hex(self.raw.as_slice()))
        }
    }
}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
///
/// Serial numbers can be up to 20 octets long but there are certificates
/// with longer or even negative serials out there. We keep the content
/// octets of the INTEGER as we find them and compare them bytewise.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Serial(Bytes);

impl Serial {
    /// Creates a serial number from the content octets of an INTEGER.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, SerialError> {
        if bytes.is_empty() {
            return Err(SerialError)
        }
        Ok(Serial(bytes))
    }

    /// Returns the content octets of the serial number.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive_if(Tag::INTEGER, |prim| {
            let bytes = prim.take_all()?;
            Self::from_bytes(bytes).map_err(|err| prim.content_err(err))
        })
    }

    /// Returns whether the serial number is negative.
    fn is_negative(&self) -> bool {
        self.0[0] & 0x80 != 0
    }

    /// Divides the magnitude by `rhs` and returns the remainder.
    fn div_assign_u8(digits: &mut [u8], rhs: u8) -> u8 {
        let mut step: u16 = 0;
        let rhs = u16::from(rhs);
        for item in digits.iter_mut() {
            step = (step << 8) + u16::from(*item);
            *item = (step / rhs) as u8;
            step %= rhs;
        }
        step as u8
    }
}


//--- From

impl From<u64> for Serial {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 9];
        bytes[1..].copy_from_slice(&value.to_be_bytes());
        let start = bytes[1..].iter().position(|&ch| ch != 0).map(|pos| {
            pos + 1
        }).unwrap_or(8);
        // Keep a leading zero if the top bit is set.
        let start = if bytes[start] & 0x80 != 0 { start - 1 } else { start };
        Serial(Bytes::copy_from_slice(&bytes[start..]))
    }
}


//--- Display and Debug

/// Non-negative serials are printed in decimal, negative ones as the hex
/// of their two’s complement encoding.
impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_negative() {
            return write!(f, "-0x{}", Hex(self.as_slice()))
        }
        let mut digits = self.0.to_vec();
        let mut res = Vec::new();
        while digits.iter().any(|&ch| ch != 0) {
            res.push(Self::div_assign_u8(&mut digits, 10) + b'0');
        }
        if res.is_empty() {
            return f.write_str("0")
        }
        for ch in res.iter().rev() {
            write!(f, "{}", *ch as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serial({})", self)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for Serial {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&self.0)
    }
}


//------------ SignedContent -------------------------------------------------

/// The signed envelope around a certificate.
///
/// ```txt
/// Certificate  ::=  SEQUENCE  {
///      tbsCertificate       TBSCertificate,
///      signatureAlgorithm   AlgorithmIdentifier,
///      signatureValue       BIT STRING  }
/// ```
#[derive(Clone, Debug)]
pub struct SignedContent {
    data: Captured,
    signature: Signature,
}

impl SignedContent {
    pub fn data(&self) -> &Captured {
        &self.data
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        decode_complete(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Ok(SignedContent {
            data: cons.capture_one()?,
            signature: Signature::new(
                SignatureAlgorithm::x509_take_from(cons)?,
                BitString::take_from(cons)?.octet_bytes()
            )
        })
    }

    pub fn verify_signature(
        &self,
        public_key: &PublicKey
    ) -> Result<(), SignatureVerificationError> {
        public_key.verify(self.data.as_ref(), &self.signature)
    }
}


//------------ Time ----------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn utc(
        year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(
            year, month, day, hour, min, sec
        ).single().map(Time)
    }

    /// Takes a UTCTime or GeneralizedTime value.
    ///
    /// RFC 5280 demands the forms YYMMDDHHMMSSZ and YYYYMMDDHHMMSSZ. We
    /// are more lenient: seconds may be missing from a UTCTime, a
    /// GeneralizedTime may have fractional seconds, and both may use an
    /// offset in the form `+HHMM` or `-HHMM` instead of the `Z`. Signing
    /// times produced by some mail clients need this.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive(|tag, prim| {
            let generalized = if tag == Tag::UTC_TIME {
                false
            }
            else if tag == Tag::GENERALIZED_TIME {
                true
            }
            else {
                return Err(prim.content_err(
                    "expected UTCTime or GeneralizedTime"
                ))
            };
            let value = prim.take_all()?;
            Self::parse(value.as_ref(), generalized).map_err(|err| {
                prim.content_err(err)
            })
        })
    }

    /// Parses the content of a UTCTime or GeneralizedTime.
    fn parse(value: &[u8], generalized: bool) -> Result<Self, ContentError> {
        let mut reader = TimeReader(value);
        let year = if generalized {
            reader.digits(4)? as i32
        }
        else {
            let year = reader.digits(2)? as i32;
            if year >= 50 { year + 1900 } else { year + 2000 }
        };
        let month = reader.digits(2)?;
        let day = reader.digits(2)?;
        let hour = reader.digits(2)?;
        let minute = reader.digits(2)?;
        let second = if reader.peek_digit() { reader.digits(2)? } else { 0 };
        let mut nanos = 0u32;
        if generalized && (reader.peek() == Some(b'.')
                            || reader.peek() == Some(b','))
        {
            reader.skip();
            let mut scale = 100_000_000u32;
            if !reader.peek_digit() {
                return Err(ContentError::from_static("malformed time value"))
            }
            while reader.peek_digit() {
                nanos += reader.digits(1)? * scale;
                scale /= 10;
            }
        }
        let offset = match reader.take() {
            Some(b'Z') => 0i64,
            Some(sign @ (b'+' | b'-')) => {
                let hours = i64::from(reader.digits(2)?);
                let minutes = i64::from(reader.digits(2)?);
                if hours > 23 || minutes > 59 {
                    return Err(ContentError::from_static(
                        "malformed time value"
                    ))
                }
                let offset = hours * 60 + minutes;
                if sign == b'-' { -offset } else { offset }
            }
            _ => {
                return Err(ContentError::from_static("malformed time value"))
            }
        };
        if !reader.0.is_empty() {
            return Err(ContentError::from_static("malformed time value"))
        }
        let time = Utc.with_ymd_and_hms(
            year, month, day, hour, minute, second
        ).single().ok_or_else(|| {
            ContentError::from_static("malformed time value")
        })?;
        let time = time + TimeDelta::nanoseconds(i64::from(nanos))
            - TimeDelta::minutes(offset);
        Ok(Time(time))
    }

    pub fn verify_not_before(
        &self,
        now: Time
    ) -> Result<(), ValidityPeriodError> {
        if now.0 < self.0 {
            Err(ValidityPeriodError::too_new())
        }
        else {
            Ok(())
        }
    }

    pub fn verify_not_after(
        &self,
        now: Time
    ) -> Result<(), ValidityPeriodError> {
        if now.0 > self.0 {
            Err(ValidityPeriodError::too_old())
        }
        else {
            Ok(())
        }
    }

    pub fn encode_utc_time(self) -> impl encode::Values {
        UtcTime(self).encode()
    }

    pub fn encode_generalized_time(self) -> impl encode::Values {
        GeneralizedTime(self).encode()
    }

    /// Encodes as UTCTime in its range and as GeneralizedTime otherwise.
    pub fn encode_varied(self) -> impl encode::Values {
        if self.year() < 1950 || self.year() > 2049 {
            (None, Some(self.encode_generalized_time()))
        }
        else {
            (Some(self.encode_utc_time()), None)
        }
    }
}


//--- Deref and AsRef

impl ops::Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<DateTime<Utc>> for Time {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}


//--- From and FromStr

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time(time)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(time: Time) -> Self {
        time.0
    }
}

impl From<SystemTime> for Time {
    fn from(time: SystemTime) -> Self {
        Time(time.into())
    }
}

impl FromStr for Time {
    type Err = chrono::format::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FromStr::from_str(s).map(Time)
    }
}


//--- Display

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}


//------------ TimeReader ----------------------------------------------------

/// A cursor over the characters of a time value.
struct TimeReader<'a>(&'a [u8]);

impl TimeReader<'_> {
    fn peek(&self) -> Option<u8> {
        self.0.first().copied()
    }

    fn peek_digit(&self) -> bool {
        matches!(self.peek(), Some(b'0'..=b'9'))
    }

    fn skip(&mut self) {
        self.0 = self.0.get(1..).unwrap_or_default();
    }

    fn take(&mut self) -> Option<u8> {
        let res = self.peek();
        self.skip();
        res
    }

    fn digits(&mut self, count: usize) -> Result<u32, ContentError> {
        let mut res = 0;
        for _ in 0..count {
            match self.take() {
                Some(ch @ b'0'..=b'9') => {
                    res = res * 10 + u32::from(ch - b'0')
                }
                _ => {
                    return Err(ContentError::from_static(
                        "malformed time value"
                    ))
                }
            }
        }
        Ok(res)
    }
}


//------------ UtcTime -------------------------------------------------------

pub struct UtcTime(Time);

impl PrimitiveContent for UtcTime {
    const TAG: Tag = Tag::UTC_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        13 // yyMMddhhmmssZ
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        write!(
            target, "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            self.0.year() % 100, self.0.month(), self.0.day(),
            self.0.hour(), self.0.minute(), self.0.second()
        )
    }
}


//------------ GeneralizedTime -----------------------------------------------

pub struct GeneralizedTime(Time);

impl PrimitiveContent for GeneralizedTime {
    const TAG: Tag = Tag::GENERALIZED_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        15 // yyyyMMddhhmmssZ
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        write!(
            target, "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            self.0.year(), self.0.month(), self.0.day(),
            self.0.hour(), self.0.minute(), self.0.second()
        )
    }
}


//------------ Validity ------------------------------------------------------

#[derive(Clone, Debug, Copy, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    pub fn not_before(self) -> Time {
        self.not_before
    }

    pub fn not_after(self) -> Time {
        self.not_after
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            ))
        })
    }

    pub fn verify(self) -> Result<(), ValidityPeriodError> {
        self.verify_at(Time::now())
    }

    pub fn verify_at(self, now: Time) -> Result<(), ValidityPeriodError> {
        self.not_before.verify_not_before(now)?;
        self.not_after.verify_not_after(now)?;
        Ok(())
    }
}


//------------ SerialError ---------------------------------------------------

/// A serial number is empty.
#[derive(Clone, Copy, Debug)]
pub struct SerialError;

impl From<SerialError> for ContentError {
    fn from(_: SerialError) -> Self {
        ContentError::from_static("empty serial number")
    }
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("empty serial number")
    }
}

impl error::Error for SerialError { }


//------------ ValidityPeriodError -------------------------------------------

/// An object is outside of its period of validity.
#[derive(Clone, Copy, Debug)]
pub struct ValidityPeriodError {
    /// Is the object too new?
    ///
    /// It is too old otherwise.
    too_new: bool,
}

impl ValidityPeriodError {
    fn too_new() -> Self {
        ValidityPeriodError { too_new: true }
    }

    fn too_old() -> Self {
        ValidityPeriodError { too_new: false }
    }
}

impl From<ValidityPeriodError> for VerificationError {
    fn from(err: ValidityPeriodError) -> Self {
        VerificationError::new(
            if err.too_new {
                "certificate is not yet valid"
            }
            else {
                "certificate has expired"
            }
        )
    }
}

impl fmt::Display for ValidityPeriodError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(
            if self.too_new {
                "object is not yet valid"
            }
            else {
                "object has expired"
            }
        )
    }
}

impl error::Error for ValidityPeriodError { }


//============ Tests =========================================================
