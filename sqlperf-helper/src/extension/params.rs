use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

/// A test parameter value, rendered as a T-SQL literal on substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl SqlParam {
    pub fn to_literal(&self) -> String {
        match self {
            SqlParam::Text(s) => format!("N'{}'", s.replace('\'', "''")),
            SqlParam::Int(i) => i.to_string(),
            SqlParam::Float(f) => format!("{:?}", f),
            SqlParam::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        }
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Text(s) => f.write_str(s),
            SqlParam::Int(i) => write!(f, "{}", i),
            SqlParam::Float(v) => write!(f, "{:?}", v),
            SqlParam::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(s: &str) -> Self {
        SqlParam::Text(s.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(s: String) -> Self {
        SqlParam::Text(s)
    }
}

impl From<i64> for SqlParam {
    fn from(i: i64) -> Self {
        SqlParam::Int(i)
    }
}

impl From<f64> for SqlParam {
    fn from(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(d: NaiveDate) -> Self {
        SqlParam::Date(d)
    }
}

/// Named `@variables` in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    params: Vec<(String, SqlParam)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter. `name` is given without the leading `@`.
    pub fn set(mut self, name: &str, value: impl Into<SqlParam>) -> Self {
        let value = value.into();
        match self
            .params
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value,
            None => self.params.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlParam> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlParam)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Replace every `@Name` token naming a known parameter by its literal.
    ///
    /// Only whole identifiers are replaced, so `@Unit` leaves `@UnitType` alone;
    /// `@@SPID`-style system functions and unknown variables stay as they are.
    pub fn substitute(&self, sql: &str) -> String {
        let literals: HashMap<String, String> = self
            .params
            .iter()
            .map(|(n, v)| (n.to_ascii_lowercase(), v.to_literal()))
            .collect();

        let mut out = String::with_capacity(sql.len());
        let mut chars = sql.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c != '@' {
                out.push(c);
                continue;
            }
            if let Some(&(_, '@')) = chars.peek() {
                chars.next();
                out.push_str("@@");
                continue;
            }
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    end = i + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let token = &sql[start..end];
            match literals.get(&token[1..].to_ascii_lowercase()) {
                Some(literal) => out.push_str(literal),
                None => out.push_str(token),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParamSet {
        ParamSet::new()
            .set("Creator", "TestUser")
            .set("TenantID", 1i64)
            .set("ReportDate", NaiveDate::from_ymd_opt(2025, 12, 28).unwrap())
            .set("DefaultUnit", "方")
            .set("ProCoeff", 2.4)
    }

    #[test]
    fn test_literals() {
        let sql = params().substitute(
            "WHERE mt.TenantId=@TenantID AND r.ReportDate = @ReportDate AND c = @ProCoeff",
        );
        assert_eq!(
            sql,
            "WHERE mt.TenantId=1 AND r.ReportDate = '2025-12-28' AND c = 2.4"
        );
    }

    #[test]
    fn test_whole_float_keeps_decimal_point() {
        let p = ParamSet::new().set("ProCoeff", 2.0);
        assert_eq!(p.substitute("c = @ProCoeff"), "c = 2.0");
        assert_eq!(p.get("ProCoeff").unwrap().to_string(), "2.0");
        assert_eq!(SqlParam::Float(0.5).to_literal(), "0.5");
    }

    #[test]
    fn test_text_is_quoted_and_escaped() {
        let p = ParamSet::new().set("Name", "O'Brien");
        assert_eq!(p.substitute("x = @Name;"), "x = N'O''Brien';");
        assert_eq!(params().substitute("ISNULL(pc.Unit, @DefaultUnit)"), "ISNULL(pc.Unit, N'方')");
    }

    #[test]
    fn test_whole_identifiers_only() {
        let p = ParamSet::new().set("Unit", "t").set("UnitType", "m3");
        assert_eq!(p.substitute("@Unit,@UnitType,@Units"), "N't',N'm3',@Units");
    }

    #[test]
    fn test_system_functions_untouched() {
        let p = ParamSet::new().set("SPID", 1i64).set("VERSION", 2i64);
        assert_eq!(
            p.substitute("SELECT @@VERSION WHERE session_id = @@SPID OR x = @spid"),
            "SELECT @@VERSION WHERE session_id = @@SPID OR x = 1"
        );
    }

    #[test]
    fn test_set_replaces() {
        let p = params().set("creator", "Other");
        assert_eq!(p.get("Creator"), Some(&SqlParam::Text("Other".into())));
        assert_eq!(p.iter().count(), 5);
        assert_eq!(p.get("TenantID").unwrap().to_string(), "1");
    }
}
