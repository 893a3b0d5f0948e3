//! Decoding of the transaction JSON produced by `mintapi`.
//!
//! mintapi has shipped two incompatible layouts over time. The `extended` layout is what
//! `mintapi --extended-transactions` writes; the `modern` layout comes from the newer REST
//! endpoints. Both are normalized into the same `Transaction`.

use crate::error::Res;
use crate::model::Amount;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which transaction JSON layout to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Try `Extended` and fall back to `Modern` if the document does not fit it.
    #[default]
    Auto,
    /// The `--extended-transactions` layout with millisecond `odate` timestamps.
    Extended,
    /// The newer layout with `YYYY-MM-DD` dates and a nested category object.
    Modern,
}

serde_plain::derive_display_from_serialize!(Schema);
serde_plain::derive_fromstr_from_deserialize!(Schema);

/// A point in time that mintapi encodes as milliseconds since the Unix epoch, either as a JSON
/// number or as a string holding an integer. It serializes back to the same integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.millis())
    }
}

struct TimestampVisitor;

impl TimestampVisitor {
    fn from_millis<E: de::Error>(millis: i64) -> Result<Timestamp, E> {
        Timestamp::from_millis(millis)
            .ok_or_else(|| E::custom(format!("timestamp {millis} is out of range")))
    }
}

impl Visitor<'_> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("integer milliseconds since the Unix epoch")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Self::from_millis(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let millis =
            i64::try_from(v).map_err(|_| E::custom(format!("timestamp {v} is out of range")))?;
        Self::from_millis(millis)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let millis = v
            .trim()
            .parse::<i64>()
            .map_err(|e| E::custom(format!("invalid timestamp '{v}': {e}")))?;
        Self::from_millis(millis)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// A single transaction as reported by mintapi, normalized across layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub(crate) date: Timestamp,
    pub(crate) note: String,
    pub(crate) is_percent: bool,
    pub(crate) is_edited: bool,
    pub(crate) is_pending: bool,
    pub(crate) is_matched: bool,
    pub(crate) is_first_date: bool,
    pub(crate) is_duplicate: bool,
    pub(crate) is_child: bool,
    pub(crate) is_spending: bool,
    pub(crate) is_transfer: bool,
    pub(crate) is_check: bool,
    pub(crate) is_debit: bool,
    pub(crate) amount: Amount,
    pub(crate) financial_institution: String,
    pub(crate) transaction_type: u32,
    pub(crate) number_matched_by_rule: i64,
    pub(crate) merchant: String,
    pub(crate) category: String,
}

impl Transaction {
    /// When the transaction happened.
    pub fn date(&self) -> Timestamp {
        self.date
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_spending(&self) -> bool {
        self.is_spending
    }

    pub fn is_transfer(&self) -> bool {
        self.is_transfer
    }
}

/// Decodes a JSON array of transactions, preserving their order.
///
/// Malformed JSON, a missing required field, or a malformed timestamp fails the whole document.
pub fn decode(bytes: &[u8], schema: Schema) -> Res<Vec<Transaction>> {
    match schema {
        Schema::Extended => decode_extended(bytes),
        Schema::Modern => decode_modern(bytes),
        Schema::Auto => match decode_extended(bytes) {
            Ok(transactions) => Ok(transactions),
            Err(extended_error) => match decode_modern(bytes) {
                Ok(transactions) => {
                    tracing::debug!("Transactions decoded with the modern layout");
                    Ok(transactions)
                }
                Err(modern_error) => Err(anyhow!(
                    "{extended_error:#} (the modern layout did not fit either: {modern_error:#})"
                )),
            },
        },
    }
}

fn decode_extended(bytes: &[u8]) -> Res<Vec<Transaction>> {
    let records: Vec<ExtendedRecord> = serde_json::from_slice(bytes)
        .context("Unable to decode transactions in the extended layout")?;
    Ok(records.into_iter().map(Transaction::from).collect())
}

fn decode_modern(bytes: &[u8]) -> Res<Vec<Transaction>> {
    let records: Vec<ModernRecord> = serde_json::from_slice(bytes)
        .context("Unable to decode transactions in the modern layout")?;
    records
        .into_iter()
        .enumerate()
        .map(|(ix, record)| {
            record
                .into_transaction()
                .with_context(|| format!("Invalid transaction at index {ix}"))
        })
        .collect()
}

/// The `mintapi --extended-transactions` layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedRecord {
    odate: Timestamp,
    #[serde(default)]
    note: String,
    #[serde(default)]
    is_percent: bool,
    #[serde(default)]
    is_edited: bool,
    #[serde(default)]
    is_pending: bool,
    #[serde(default)]
    is_matched: bool,
    #[serde(default)]
    is_first_date: bool,
    #[serde(default)]
    is_duplicate: bool,
    #[serde(default)]
    is_child: bool,
    #[serde(default)]
    is_spending: bool,
    #[serde(default)]
    is_transfer: bool,
    #[serde(default)]
    is_check: bool,
    #[serde(default)]
    is_debit: bool,
    amount: Amount,
    #[serde(default, rename = "fi")]
    financial_institution: String,
    #[serde(default, rename = "txnType")]
    transaction_type: u32,
    #[serde(default)]
    number_matched_by_rule: i64,
    #[serde(default)]
    merchant: String,
    #[serde(default)]
    category: String,
}

impl From<ExtendedRecord> for Transaction {
    fn from(r: ExtendedRecord) -> Self {
        Self {
            date: r.odate,
            note: r.note,
            is_percent: r.is_percent,
            is_edited: r.is_edited,
            is_pending: r.is_pending,
            is_matched: r.is_matched,
            is_first_date: r.is_first_date,
            is_duplicate: r.is_duplicate,
            is_child: r.is_child,
            is_spending: r.is_spending,
            is_transfer: r.is_transfer,
            is_check: r.is_check,
            is_debit: r.is_debit,
            amount: r.amount,
            financial_institution: r.financial_institution,
            transaction_type: r.transaction_type,
            number_matched_by_rule: r.number_matched_by_rule,
            merchant: r.merchant,
            category: r.category,
        }
    }
}

/// The newer mintapi layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModernRecord {
    date: String,
    description: String,
    amount: Amount,
    #[serde(default)]
    category: ModernCategory,
    #[serde(default)]
    is_expense: bool,
    #[serde(default)]
    is_pending: bool,
    #[serde(default)]
    is_linked_to_rule: bool,
    #[serde(default)]
    status: String,
    #[serde(default)]
    match_state: String,
    #[serde(default)]
    account_ref: ModernAccountRef,
    #[serde(default)]
    fi_data: ModernFiData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModernCategory {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ModernAccountRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ModernFiData {
    #[serde(default)]
    description: String,
}

impl ModernRecord {
    fn into_transaction(self) -> Res<Transaction> {
        let date = parse_local_date(&self.date)?;
        // In this layout money leaving the account is negative, in the extended layout it is
        // positive.
        let is_debit = self.amount.is_negative();
        Ok(Transaction {
            date,
            note: self.fi_data.description,
            is_percent: false,
            is_edited: false,
            is_pending: self.is_pending || self.status.eq_ignore_ascii_case("PENDING"),
            is_matched: self.match_state.eq_ignore_ascii_case("MATCHED"),
            is_first_date: false,
            is_duplicate: false,
            is_child: false,
            is_spending: self.is_expense,
            is_transfer: self.category.category_type.eq_ignore_ascii_case("TRANSFER"),
            is_check: false,
            is_debit,
            amount: self.amount.negate(),
            financial_institution: self.account_ref.name,
            transaction_type: 0,
            number_matched_by_rule: i64::from(self.is_linked_to_rule),
            merchant: self.description,
            category: self.category.name,
        })
    }
}

/// Parses a `YYYY-MM-DD` date as local midnight.
fn parse_local_date(s: &str) -> Res<Timestamp> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD"))?;
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let local = Local
        .from_local_datetime(&midnight)
        .earliest()
        .with_context(|| format!("The date '{s}' does not exist in the local time zone"))?;
    Ok(Timestamp(local.with_timezone(&Utc)))
}
