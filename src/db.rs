//!
//! S7 data block source generation.
//!
//! Renders a `DATA_BLOCK` in SCL source form from a description, e.g. the
//! block whose `data1`..`data4` variables the page reads and writes.
//!
use std::convert::TryFrom;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Field, Result};

///
/// Deserializer helpers
///
pub mod de {
    use super::*;

    fn yes() -> bool { true }

    #[derive(Debug, Deserialize)]
    pub struct DataBlock {
        pub name: String,
        #[serde(default="yes")]
        pub optimized_access: bool,
        #[serde(default)]
        pub unlinked: bool,
        #[serde(default)]
        pub read_only: bool,
        #[serde(default="yes")]
        pub accessible_from_opc: bool,
        #[serde(default)]
        pub variables: Vec<Variable>
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag="type")]
    pub enum Variable {
        Bool { name: String, value: bool },
        DInt { name: String, value: i32 },
        String { name: String, value: String },
        Array {
            name: String,
            element: ElementType,
            #[serde(default)]
            values: Option<Value>,
            #[serde(default)]
            length: Option<usize>,
            #[serde(default)]
            start: i32
        }
    }
}

/// Element types an array may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ElementType {
    Bool,
    DInt
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Bool => write!(f, "Bool"),
            ElementType::DInt => write!(f, "DInt")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool(bool),
    DInt(i32)
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::DInt(n) => write!(f, "{}", n)
        }
    }
}

/// Rectangular array, values stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    element: ElementType,
    start: i32,
    dims: Vec<usize>,
    values: Vec<Scalar>
}

impl Array {
    /// Declared but not initialized.
    pub fn empty(element: ElementType, length: usize, start: i32) -> Result<Array> {
        if length == 0 {
            return Err(Error::config("array length must be at least 1"));
        }
        let dims = vec![length];
        check_bounds(start, &dims)?;
        Ok(Array { element, start, dims, values: vec![] })
    }

    /// Array initialized from (possibly nested) json arrays.
    pub fn from_json(element: ElementType, values: &Value, start: i32) -> Result<Array> {
        let mut dims = vec![];
        let mut cur = values;
        while let Value::Array(items) = cur {
            if items.is_empty() {
                return Err(Error::config("arrays must not be empty"));
            }
            dims.push(items.len());
            cur = &items[0];
        }
        if dims.is_empty() {
            return Err(Error::config("array values must be a json array"));
        }
        check_bounds(start, &dims)?;

        let mut flat = Vec::with_capacity(dims.iter().product());
        collect(values, &dims, element, &mut flat)?;

        Ok(Array { element, start, dims, values: flat })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// `Array[s..e, 0..e2] of T`
    fn declaration(&self) -> String {
        let ranges: Vec<String> = self.dims.iter().enumerate()
            .map(|(i, len)| {
                let lo = if i == 0 { self.start as i64 } else { 0 };
                format!("{}..{}", lo, lo + *len as i64 - 1)
            })
            .collect();

        format!("Array[{}] of {}", ranges.join(", "), self.element)
    }

    /// index tuples in row-major order, first index shifted by `start`
    fn indices(&self) -> Vec<String> {
        let mut progress = vec![0usize; self.dims.len()];
        let mut out = Vec::with_capacity(self.values.len());

        for _ in 0..self.values.len() {
            let idx: Vec<String> = progress.iter().enumerate()
                .map(|(i, p)| if i == 0 { (*p as i64 + self.start as i64).to_string() } else { p.to_string() })
                .collect();
            out.push(idx.join(","));

            for d in (0..self.dims.len()).rev() {
                if progress[d] + 1 < self.dims[d] {
                    progress[d] += 1;
                    break;
                }
                progress[d] = 0;
            }
        }
        out
    }
}

/// Every index, the first shifted by `start`, must be a DInt.
fn check_bounds(start: i32, dims: &[usize]) -> Result<()> {
    for (i, len) in dims.iter().enumerate() {
        let lo = if i == 0 { start } else { 0 };
        let hi = i32::try_from(*len - 1).ok().and_then(|last| lo.checked_add(last));
        if hi.is_none() {
            return Err(Error::config(format!("{} elements from index {} exceed the DInt range", len, lo)));
        }
    }
    Ok(())
}

fn collect(value: &Value, dims: &[usize], element: ElementType, out: &mut Vec<Scalar>) -> Result<()> {
    match dims.split_first() {
        None => {
            out.push(scalar(value, element)?);
            Ok(())
        },
        Some((len, rest)) => match value {
            Value::Array(items) if items.len() == *len => {
                items.iter().try_for_each(|item| collect(item, rest, element, out))
            },
            _ => Err(Error::config("nested arrays must all have the same shape"))
        }
    }
}

fn scalar(value: &Value, element: ElementType) -> Result<Scalar> {
    match (element, value) {
        (ElementType::Bool, Value::Bool(b)) => Ok(Scalar::Bool(*b)),
        (ElementType::DInt, Value::Number(n)) => {
            n.as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Scalar::DInt)
                .ok_or_else(|| Error::config(format!("{} is not a DInt", n)))
        },
        _ => Err(Error::config(format!("{} is not a {}", value, element)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Bool(bool),
    DInt(i32),
    String(String),
    Array(Array)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: Kind
}

impl Variable {
    pub fn new<T: Into<String>>(name: T, kind: Kind) -> Variable {
        Variable { name: name.into(), kind }
    }

    fn declaration(&self) -> String {
        let ty = match &self.kind {
            Kind::Bool(_) => "Bool".to_string(),
            Kind::DInt(_) => "DInt".to_string(),
            Kind::String(_) => "String".to_string(),
            Kind::Array(array) => array.declaration()
        };
        format!("\"{}\" : {}", self.name, ty)
    }

    fn write_init(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Bool(b) => writeln!(f, "   \"{}\" := {};", self.name, b),
            Kind::DInt(n) => writeln!(f, "   \"{}\" := {};", self.name, n),
            Kind::String(s) => writeln!(f, "   \"{}\" := '{}';", self.name, s.replace('\'', "''")),
            Kind::Array(array) => {
                for (idx, value) in array.indices().iter().zip(array.values.iter()) {
                    writeln!(f, "   \"{}\"[{}] := {};", self.name, idx, value)?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<de::Variable> for Variable {
    type Error = Error;

    fn try_from(var: de::Variable) -> Result<Variable> {
        let var = match var {
            de::Variable::Bool { name, value } => Variable::new(name, Kind::Bool(value)),
            de::Variable::DInt { name, value } => Variable::new(name, Kind::DInt(value)),
            de::Variable::String { name, value } => Variable::new(name, Kind::String(value)),
            de::Variable::Array { name, element, values, length, start } => {
                let array = match (values, length) {
                    (Some(values), _) => Array::from_json(element, &values, start),
                    (None, Some(length)) => Array::empty(element, length, start),
                    (None, None) => Err(Error::config("array needs values or a length"))
                }
                .map_err(|err| Error::config(format!("{}: {}", name, err.msg)))?;
                Variable::new(name, Kind::Array(array))
            }
        };
        Ok(var)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub name: String,
    pub optimized_access: bool,
    pub unlinked: bool,
    pub read_only: bool,
    pub accessible_from_opc: bool,
    variables: Vec<Variable>
}

impl DataBlock {
    pub fn new<T: Into<String>>(name: T) -> DataBlock {
        DataBlock {
            name: name.into(),
            optimized_access: true,
            unlinked: false,
            read_only: false,
            accessible_from_opc: true,
            variables: vec![]
        }
    }

    /// Block holding the four page fields as DInt, all zero.
    pub fn for_page<T: Into<String>>(name: T) -> DataBlock {
        let mut db = DataBlock::new(name);
        for field in Field::ALL.iter() {
            db.variables.push(Variable::new(field.name(), Kind::DInt(0)));
        }
        db
    }

    pub fn from_json(json: &str) -> Result<DataBlock> {
        let raw: de::DataBlock = serde_json::from_str(json)?;

        let mut db = DataBlock::new(raw.name);
        db.optimized_access = raw.optimized_access;
        db.unlinked = raw.unlinked;
        db.read_only = raw.read_only;
        db.accessible_from_opc = raw.accessible_from_opc;

        for var in raw.variables {
            db.push(Variable::try_from(var)?)?;
        }
        Ok(db)
    }

    /// Add a variable; names must be unique within the block.
    pub fn push(&mut self, var: Variable) -> Result<()> {
        if self.variables.iter().any(|v| v.name == var.name) {
            return Err(Error::config(format!("duplicate variable '{}' in {}", var.name, self.name)));
        }
        self.variables.push(var);
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// `<name>.db`
    pub fn default_file_name(&self) -> PathBuf {
        PathBuf::from(format!("{}.db", self.name))
    }

    pub fn write_to<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DATA_BLOCK \"{}\"", self.name)?;
        write!(f, "{{")?;
        if !self.accessible_from_opc {
            writeln!(f, " DB_Accessible_From_OPC_UA := 'FALSE' ;")?;
        }
        let optimized = if self.optimized_access { "TRUE" } else { "FALSE" };
        writeln!(f, " S7_Optimized_Access := '{}' }}", optimized)?;
        writeln!(f, "VERSION : 0.1")?;
        if self.unlinked {
            writeln!(f, "UNLINKED")?;
        }
        if self.read_only {
            writeln!(f, "READ_ONLY")?;
        }
        Ok(())
    }
}

impl fmt::Display for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;

        writeln!(f, "NON_RETAIN")?;
        writeln!(f, "   VAR")?;
        for var in self.variables.iter() {
            writeln!(f, "      {};", var.declaration())?;
        }
        write!(f, "   END_VAR\n\n\n")?;

        writeln!(f, "BEGIN")?;
        for var in self.variables.iter() {
            var.write_init(f)?;
        }
        writeln!(f, "END_DATA_BLOCK")
    }
}
