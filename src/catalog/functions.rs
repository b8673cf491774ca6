//! Built-in SQL function table.

use crate::error::{Error, Result};
use crate::types::DataType;

/// A built-in function known to the analyzer.
#[derive(Debug)]
pub struct FunctionDefinition {
    /// Lowercase function name.
    pub name: &'static str,
    /// Whether this is an aggregate function.
    pub aggregate: bool,
    /// Result type assumed by schema derivation, without looking at arguments.
    pub predicted: DataType,
    check: fn(&'static str, &[DataType], bool) -> Result<DataType>,
}

impl FunctionDefinition {
    /// Validates argument types and returns the call's result type.
    ///
    /// # Errors
    ///
    /// Returns an arity or type error if the arguments do not fit.
    pub fn check(&self, args: &[DataType], star: bool) -> Result<DataType> {
        (self.check)(self.name, args, star)
    }
}

/// Looks up a built-in by name (case-insensitive).
#[must_use]
pub fn lookup(name: &str) -> Option<&'static FunctionDefinition> {
    let name = name.to_lowercase();
    BUILTINS.iter().find(|f| f.name == name)
}

/// Returns true if `name` is a built-in aggregate function.
#[must_use]
pub fn is_aggregate(name: &str) -> bool {
    lookup(name).is_some_and(|f| f.aggregate)
}

const fn scalar(
    name: &'static str,
    predicted: DataType,
    check: fn(&'static str, &[DataType], bool) -> Result<DataType>,
) -> FunctionDefinition {
    FunctionDefinition {
        name,
        aggregate: false,
        predicted,
        check,
    }
}

const fn aggregate(
    name: &'static str,
    predicted: DataType,
    check: fn(&'static str, &[DataType], bool) -> Result<DataType>,
) -> FunctionDefinition {
    FunctionDefinition {
        name,
        aggregate: true,
        predicted,
        check,
    }
}

static BUILTINS: &[FunctionDefinition] = &[
    scalar("abs", DataType::Int, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 1)?;
        expect(name, DataType::Int, args[0])?;
        Ok(DataType::Int)
    }),
    scalar("length", DataType::Int, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 1)?;
        expect(name, DataType::Text, args[0])?;
        Ok(DataType::Int)
    }),
    scalar("lower", DataType::Text, text_unary),
    scalar("upper", DataType::Text, text_unary),
    scalar("trim", DataType::Text, text_trim),
    scalar("ltrim", DataType::Text, text_trim),
    scalar("rtrim", DataType::Text, text_trim),
    scalar("format", DataType::Text, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, usize::MAX)?;
        expect(name, DataType::Text, args[0])?;
        Ok(DataType::Text)
    }),
    scalar("coalesce", DataType::Text, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, usize::MAX)?;
        common(name, args)
    }),
    scalar("ifnull", DataType::Text, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 2, 2)?;
        common(name, args)
    }),
    scalar("iif", DataType::Text, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 3, 3)?;
        expect(name, DataType::Bool, args[0])?;
        common(name, &args[1..])
    }),
    scalar("nullif", DataType::Text, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 2, 2)?;
        common(name, args)?;
        Ok(args[0])
    }),
    scalar("error", DataType::Null, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 1)?;
        expect(name, DataType::Text, args[0])?;
        Ok(DataType::Null)
    }),
    scalar("uuid_generate_v5", DataType::Uuid, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 2, 2)?;
        expect(name, DataType::Uuid, args[0])?;
        expect(name, DataType::Text, args[1])?;
        Ok(DataType::Uuid)
    }),
    aggregate("count", DataType::Int, |name, args, star| {
        if star {
            arity(name, args, 0, 0)?;
        } else {
            arity(name, args, 1, 1)?;
        }
        Ok(DataType::Int)
    }),
    aggregate("sum", DataType::Int, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 1)?;
        expect(name, DataType::Int, args[0])?;
        Ok(DataType::Int)
    }),
    aggregate("min", DataType::Int, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 1)?;
        Ok(args[0])
    }),
    aggregate("max", DataType::Int, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 1)?;
        Ok(args[0])
    }),
    aggregate("group_concat", DataType::Text, |name, args, star| {
        no_star(name, star)?;
        arity(name, args, 1, 2)?;
        for arg in args {
            expect(name, DataType::Text, *arg)?;
        }
        Ok(DataType::Text)
    }),
];

fn text_unary(name: &'static str, args: &[DataType], star: bool) -> Result<DataType> {
    no_star(name, star)?;
    arity(name, args, 1, 1)?;
    expect(name, DataType::Text, args[0])?;
    Ok(DataType::Text)
}

fn text_trim(name: &'static str, args: &[DataType], star: bool) -> Result<DataType> {
    no_star(name, star)?;
    arity(name, args, 1, 2)?;
    for arg in args {
        expect(name, DataType::Text, *arg)?;
    }
    Ok(DataType::Text)
}

fn no_star(name: &str, star: bool) -> Result<()> {
    if star {
        return Err(Error::Structural(format!("{name}(*) is not allowed")));
    }
    Ok(())
}

fn arity(name: &str, args: &[DataType], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if args.len() < min { min } else { max };
        return Err(Error::ArityMismatch {
            context: format!("call to {name}"),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn expect(name: &str, expected: DataType, actual: DataType) -> Result<()> {
    if !expected.is_compatible(&actual) {
        return Err(Error::type_mismatch(
            format!("argument to {name}"),
            expected,
            actual,
        ));
    }
    Ok(())
}

/// All arguments must agree; the first concrete type wins.
fn common(name: &str, args: &[DataType]) -> Result<DataType> {
    let Some(first) = args.iter().copied().find(|t| !t.is_wildcard()) else {
        return Ok(args.first().copied().unwrap_or(DataType::Null));
    };
    for arg in args {
        expect(name, first, *arg)?;
    }
    Ok(first)
}
