//! EIP-712 structured data hashing.
//!
//! Schemas are explicit tables of named struct types. Field types are parsed
//! once when the schema is built, and every struct reference is checked to
//! exist before anything is hashed.
//!
//! ```text
//! digest = keccak256(0x1901 || hashStruct(EIP712Domain, domain) || hashStruct(primary, message))
//! hashStruct(T, v) = keccak256(hashType(T) || encodeData(T, v))
//! ```
//!
//! Array-typed fields are accepted in type strings but cannot be encoded.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use alloy_primitives::{keccak256, Address, B256, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::domain::{TypedDataDomain, EIP712_DOMAIN_TYPE};
use crate::{Error, Result};

/// Two-byte prefix of every EIP-712 digest.
pub const TYPED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];

/// Parsed Solidity type of a struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Address,
    Bool,
    String,
    Bytes,
    /// `bytes1` .. `bytes32`
    FixedBytes(usize),
    /// `uint8` .. `uint256`
    Uint(usize),
    /// `int8` .. `int256`
    Int(usize),
    /// Reference to another struct in the schema.
    Struct(String),
    /// `T[]` or `T[n]`.
    Array {
        element: Box<FieldType>,
        len: Option<usize>,
    },
}

impl FieldType {
    /// Parse a Solidity type name. Anything that is not an elementary type
    /// is taken as a struct reference.
    pub fn parse(type_name: &str) -> Result<Self> {
        let type_name = type_name.trim();
        if let Some(prefix) = type_name.strip_suffix(']') {
            let open = prefix
                .rfind('[')
                .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
            let len = match &prefix[open + 1..] {
                "" => None,
                digits => Some(
                    digits
                        .parse::<usize>()
                        .map_err(|_| Error::UnknownType(type_name.to_string()))?,
                ),
            };
            return Ok(FieldType::Array {
                element: Box::new(FieldType::parse(&prefix[..open])?),
                len,
            });
        }

        match type_name {
            "address" => return Ok(FieldType::Address),
            "bool" => return Ok(FieldType::Bool),
            "string" => return Ok(FieldType::String),
            "bytes" => return Ok(FieldType::Bytes),
            _ => {}
        }

        if let Some(size) = elementary_size(type_name, "bytes") {
            return match size {
                1..=32 => Ok(FieldType::FixedBytes(size)),
                _ => Err(Error::UnknownType(type_name.to_string())),
            };
        }
        if let Some(bits) = elementary_size(type_name, "uint") {
            return valid_int_bits(bits, type_name).map(FieldType::Uint);
        }
        if let Some(bits) = elementary_size(type_name, "int") {
            return valid_int_bits(bits, type_name).map(FieldType::Int);
        }

        let is_identifier = type_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && type_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !is_identifier {
            return Err(Error::UnknownType(type_name.to_string()));
        }
        Ok(FieldType::Struct(type_name.to_string()))
    }

    /// Struct name this type depends on, looking through arrays.
    pub fn struct_dependency(&self) -> Option<&str> {
        match self {
            FieldType::Struct(name) => Some(name),
            FieldType::Array { element, .. } => element.struct_dependency(),
            _ => None,
        }
    }
}

fn elementary_size(type_name: &str, prefix: &str) -> Option<usize> {
    let digits = type_name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn valid_int_bits(bits: usize, type_name: &str) -> Result<usize> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(Error::UnknownType(type_name.to_string()));
    }
    Ok(bits)
}

/// One `type name` member of a struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTypedField", into = "RawTypedField")]
pub struct TypedField {
    pub name: String,
    /// Type exactly as declared; this text goes into the type string.
    pub type_name: String,
    pub kind: FieldType,
}

impl TypedField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Result<Self> {
        let type_name = type_name.into();
        let kind = FieldType::parse(&type_name)?;
        Ok(Self {
            name: name.into(),
            type_name,
            kind,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct RawTypedField {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

impl TryFrom<RawTypedField> for TypedField {
    type Error = Error;

    fn try_from(raw: RawTypedField) -> Result<Self> {
        TypedField::new(raw.name, raw.type_name)
    }
}

impl From<TypedField> for RawTypedField {
    fn from(field: TypedField) -> Self {
        Self {
            name: field.name,
            type_name: field.type_name,
        }
    }
}

/// Table of struct types keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<TypedField>>",
    into = "BTreeMap<String, Vec<TypedField>>"
)]
pub struct TypedDataSchema {
    types: BTreeMap<String, Vec<TypedField>>,
}

impl TypedDataSchema {
    /// Build a schema, failing if any field references a missing struct.
    pub fn new(types: BTreeMap<String, Vec<TypedField>>) -> Result<Self> {
        for (type_name, fields) in &types {
            let mut seen = HashSet::new();
            for field in fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(Error::invalid_value(
                        format!("{type_name}.{}", field.name),
                        "duplicate field name",
                    ));
                }
                if let Some(dependency) = field.kind.struct_dependency() {
                    if !types.contains_key(dependency) {
                        return Err(Error::UnknownType(format!(
                            "{dependency} (referenced by {type_name}.{})",
                            field.name
                        )));
                    }
                }
            }
        }
        Ok(Self { types })
    }

    /// Build a schema from `(type, [(field, field_type)])` definitions.
    pub fn from_definitions<'a, I, F>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, F)>,
        F: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut types = BTreeMap::new();
        for (type_name, fields) in definitions {
            let fields = fields
                .into_iter()
                .map(|(name, field_type)| TypedField::new(name, field_type))
                .collect::<Result<Vec<_>>>()?;
            types.insert(type_name.to_string(), fields);
        }
        Self::new(types)
    }

    /// Declared fields of `type_name`.
    pub fn fields(&self, type_name: &str) -> Option<&[TypedField]> {
        self.types.get(type_name).map(Vec::as_slice)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    fn require(&self, type_name: &str) -> Result<&[TypedField]> {
        self.fields(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }
}

impl TryFrom<BTreeMap<String, Vec<TypedField>>> for TypedDataSchema {
    type Error = Error;

    fn try_from(types: BTreeMap<String, Vec<TypedField>>) -> Result<Self> {
        Self::new(types)
    }
}

impl From<TypedDataSchema> for BTreeMap<String, Vec<TypedField>> {
    fn from(schema: TypedDataSchema) -> Self {
        schema.types
    }
}

/// Every struct reachable from `type_name`, excluding `type_name` itself,
/// in alphabetical order.
pub fn find_dependencies(type_name: &str, schema: &TypedDataSchema) -> Result<Vec<String>> {
    let mut visited = HashSet::new();
    let mut stack = vec![type_name.to_string()];
    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        for field in schema.require(&current)? {
            if let Some(dependency) = field.kind.struct_dependency() {
                if !visited.contains(dependency) {
                    stack.push(dependency.to_string());
                }
            }
        }
    }

    visited.remove(type_name);
    let mut dependencies: Vec<String> = visited.into_iter().collect();
    dependencies.sort();
    Ok(dependencies)
}

/// Type string: the primary struct followed by its sorted dependencies.
pub fn encode_type(type_name: &str, schema: &TypedDataSchema) -> Result<String> {
    let mut encoded = String::new();
    for name in std::iter::once(type_name.to_string()).chain(find_dependencies(type_name, schema)?)
    {
        let members = schema
            .require(&name)?
            .iter()
            .map(|field| format!("{} {}", field.type_name, field.name))
            .collect::<Vec<_>>()
            .join(",");
        encoded.push_str(&format!("{name}({members})"));
    }
    Ok(encoded)
}

pub fn hash_type(type_name: &str, schema: &TypedDataSchema) -> Result<B256> {
    Ok(keccak256(encode_type(type_name, schema)?))
}

/// `hashType(T)` followed by one 32-byte word per declared field.
pub fn encode_data(type_name: &str, data: &Value, schema: &TypedDataSchema) -> Result<Vec<u8>> {
    let fields = schema.require(type_name)?;
    let object = data.as_object().ok_or_else(|| {
        Error::invalid_value(type_name, format!("expected an object, got {data}"))
    })?;

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(hash_type(type_name, schema)?.as_slice());
    for field in fields {
        let value = object.get(&field.name).ok_or_else(|| Error::MissingField {
            type_name: type_name.to_string(),
            field: field.name.clone(),
        })?;
        let path = format!("{type_name}.{}", field.name);
        let word = encode_field(&path, &field.kind, &field.type_name, value, schema)?;
        encoded.extend_from_slice(word.as_slice());
    }
    Ok(encoded)
}

pub fn hash_struct(type_name: &str, data: &Value, schema: &TypedDataSchema) -> Result<B256> {
    Ok(keccak256(encode_data(type_name, data, schema)?))
}

/// Domain separator of `domain` restricted to the members in `domain_schema`.
pub fn hash_domain(domain: &TypedDataDomain, domain_schema: &[TypedField]) -> Result<B256> {
    let schema = TypedDataSchema::new(BTreeMap::from([(
        EIP712_DOMAIN_TYPE.to_string(),
        domain_schema.to_vec(),
    )]))?;
    hash_struct(EIP712_DOMAIN_TYPE, &serde_json::to_value(domain)?, &schema)
}

/// `keccak256(0x1901 || domain_separator || struct_hash)`.
pub fn typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut data = [0u8; 66];
    data[..2].copy_from_slice(&TYPED_DATA_PREFIX);
    data[2..34].copy_from_slice(domain_separator.as_slice());
    data[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(data)
}

/// Final digest to sign for `message` of type `primary_type`.
///
/// The domain is hashed with the schema's `EIP712Domain` entry when it has
/// one, and with the four standard members otherwise.
pub fn digest(
    domain: &TypedDataDomain,
    primary_type: &str,
    message: &Value,
    schema: &TypedDataSchema,
) -> Result<B256> {
    let separator = match schema.fields(EIP712_DOMAIN_TYPE) {
        Some(domain_schema) => hash_domain(domain, domain_schema)?,
        None => hash_domain(domain, &TypedDataDomain::default_schema())?,
    };
    let struct_hash = hash_struct(primary_type, message, schema)?;
    let digest = typed_data_hash(separator, struct_hash);
    debug!(%separator, %struct_hash, %digest, primary_type, "computed typed data digest");
    Ok(digest)
}

/// An `eth_signTypedData` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: TypedDataSchema,
    pub primary_type: String,
    /// Domain values; only the members declared in `types.EIP712Domain` are hashed.
    pub domain: Value,
    pub message: Value,
}

impl TypedData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn domain_separator(&self) -> Result<B256> {
        if self.types.contains(EIP712_DOMAIN_TYPE) {
            return hash_struct(EIP712_DOMAIN_TYPE, &self.domain, &self.types);
        }
        let domain: TypedDataDomain = serde_json::from_value(self.domain.clone())?;
        hash_domain(&domain, &TypedDataDomain::default_schema())
    }

    pub fn struct_hash(&self) -> Result<B256> {
        hash_struct(&self.primary_type, &self.message, &self.types)
    }

    pub fn encode_type(&self) -> Result<String> {
        encode_type(&self.primary_type, &self.types)
    }

    pub fn digest(&self) -> Result<B256> {
        Ok(typed_data_hash(self.domain_separator()?, self.struct_hash()?))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Address => write!(f, "address"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::String => write!(f, "string"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::FixedBytes(size) => write!(f, "bytes{size}"),
            FieldType::Uint(bits) => write!(f, "uint{bits}"),
            FieldType::Int(bits) => write!(f, "int{bits}"),
            FieldType::Struct(name) => write!(f, "{name}"),
            FieldType::Array { element, len: Some(len) } => write!(f, "{element}[{len}]"),
            FieldType::Array { element, len: None } => write!(f, "{element}[]"),
        }
    }
}

// ----------------------------------------------------------------------
// Field encoding
// ----------------------------------------------------------------------

fn encode_field(
    path: &str,
    kind: &FieldType,
    type_name: &str,
    value: &Value,
    schema: &TypedDataSchema,
) -> Result<B256> {
    match kind {
        FieldType::String => {
            let text = value
                .as_str()
                .ok_or_else(|| Error::invalid_value(path, "expected a string"))?;
            Ok(keccak256(text.as_bytes()))
        }
        FieldType::Bytes => Ok(keccak256(parse_hex_bytes(path, value)?)),
        FieldType::Struct(name) => hash_struct(name, value, schema),
        FieldType::Array { .. } => Err(Error::UnsupportedType(format!(
            "{type_name} in {path}: array members cannot be encoded"
        ))),
        FieldType::Address => {
            let text = value
                .as_str()
                .ok_or_else(|| Error::invalid_value(path, "expected an address string"))?;
            let address: Address = text
                .parse()
                .map_err(|e| Error::invalid_value(path, format!("{e}")))?;
            Ok(B256::left_padding_from(address.as_slice()))
        }
        FieldType::Bool => match value {
            Value::Bool(flag) => Ok(B256::from(U256::from(u8::from(*flag)).to_be_bytes::<32>())),
            _ => Err(Error::invalid_value(path, "expected a boolean")),
        },
        FieldType::Uint(bits) => {
            let number = parse_uint(path, value)?;
            if number.bit_len() > *bits {
                return Err(Error::invalid_value(
                    path,
                    format!("{number} does not fit in {type_name}"),
                ));
            }
            Ok(B256::from(number.to_be_bytes::<32>()))
        }
        FieldType::Int(bits) => {
            let number = parse_int(path, value)?;
            if *bits < 256 {
                let max = I256::from_raw((U256::from(1u64) << (bits - 1)) - U256::from(1u64));
                let min = I256::from_raw(U256::MAX << (bits - 1));
                if number < min || number > max {
                    return Err(Error::invalid_value(
                        path,
                        format!("{number} does not fit in {type_name}"),
                    ));
                }
            }
            Ok(B256::from(number.into_raw().to_be_bytes::<32>()))
        }
        FieldType::FixedBytes(size) => {
            let raw = parse_hex_bytes(path, value)?;
            if raw.len() != *size {
                return Err(Error::invalid_value(
                    path,
                    format!("expected {size} bytes, got {}", raw.len()),
                ));
            }
            Ok(B256::right_padding_from(&raw))
        }
    }
}

fn parse_hex_bytes(path: &str, value: &Value) -> Result<Vec<u8>> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::invalid_value(path, "expected a 0x-prefixed hex string"))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| Error::invalid_value(path, "expected a 0x-prefixed hex string"))?;
    if digits.len() % 2 != 0 {
        return Err(Error::OddLengthHex { len: digits.len() });
    }
    Ok(hex::decode(digits)?)
}

fn parse_uint(path: &str, value: &Value) -> Result<U256> {
    match value {
        Value::Number(number) => number.as_u64().map(U256::from).ok_or_else(|| {
            Error::invalid_value(
                path,
                format!("{number} is not a u64; pass large integers as strings"),
            )
        }),
        Value::String(text) => {
            let parsed = match text.strip_prefix("0x") {
                Some(digits) if is_digits(digits, 16) => U256::from_str_radix(digits, 16),
                None if is_digits(text, 10) => U256::from_str_radix(text, 10),
                _ => {
                    return Err(Error::invalid_value(
                        path,
                        format!("{text:?} is not a decimal or 0x-prefixed hex integer"),
                    ))
                }
            };
            parsed.map_err(|e| Error::invalid_value(path, format!("{text}: {e}")))
        }
        other => Err(Error::invalid_value(
            path,
            format!("expected an integer, got {other}"),
        )),
    }
}

fn parse_int(path: &str, value: &Value) -> Result<I256> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|n| I256::try_from(n).ok())
            .ok_or_else(|| {
                Error::invalid_value(
                    path,
                    format!("{number} is not an i64; pass large integers as strings"),
                )
            }),
        Value::String(text) => {
            let digits = text.strip_prefix('-').unwrap_or(text);
            if !is_digits(digits, 10) {
                return Err(Error::invalid_value(
                    path,
                    format!("{text:?} is not a decimal integer"),
                ));
            }
            I256::from_dec_str(text)
                .map_err(|e| Error::invalid_value(path, format!("{text}: {e}")))
        }
        other => Err(Error::invalid_value(
            path,
            format!("expected an integer, got {other}"),
        )),
    }
}

/// Non-empty and made only of digits in `radix`; no signs or separators.
fn is_digits(text: &str, radix: u32) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_digit(radix))
}
