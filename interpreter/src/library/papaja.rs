//! APA-style number formatting for reporting statistics in prose.

use crate::error::RuntimeError;
use crate::format::round_to;
use crate::library::base::group_thousands;
use crate::library::{Arguments, CallContext, Package};
use crate::runtime_value::RuntimeValue;

pub fn package() -> Package {
    Package::new("papaja")
        .function("printnum", printnum)
        .function("printp", printp)
        .with_startup_message("Loading required package: tinylabels")
}

struct NumberStyle {
    digits: usize,
    /// Keep the leading zero for values that cannot exceed one.
    gt1: bool,
    /// Allow values that round to zero; otherwise report `< 0.01`.
    zero: bool,
    big_mark: String,
}

impl NumberStyle {
    fn apply(&self, n: f64) -> String {
        if n.is_nan() {
            return "NA".to_string();
        }
        let rounded = round_to(n, self.digits as i32);
        if rounded == 0.0 && !self.zero && n != 0.0 {
            let smallest = format!("{:.*}", self.digits, 10f64.powi(-(self.digits as i32)));
            format!("< {}", self.strip_zero(&smallest))
        } else {
            let fixed = format!("{:.*}", self.digits, rounded.abs());
            let sign = if rounded < 0.0 { "-" } else { "" };
            format!("{}{}", sign, self.strip_zero(&group_thousands(&fixed, &self.big_mark)))
        }
    }

    fn strip_zero(&self, text: &str) -> String {
        match text.strip_prefix("0.") {
            Some(rest) if !self.gt1 => format!(".{}", rest),
            _ => text.to_string(),
        }
    }
}

/// `printnum(x, digits = 2, gt1 = TRUE, zero = TRUE, big.mark = ",")`
fn printnum(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let values = args.required("x", 0)?.numbers("printnum")?;
    let digits = args.number_or("digits", 1, 2.0)?;
    if !(0.0..=20.0).contains(&digits) {
        return Err(RuntimeError::invalid_argument(
            "printnum",
            "'digits' must be between 0 and 20",
        ));
    }
    let style = NumberStyle {
        digits: digits as usize,
        gt1: args.flag("gt1", 2, true)?,
        zero: args.flag("zero", 3, true)?,
        big_mark: args.string("big.mark", 4).unwrap_or_else(|| ",".to_string()),
    };
    Ok(RuntimeValue::from_strings(values.iter().map(|n| style.apply(*n))))
}

/// `printp(p, digits = 3)`: p values without a leading zero, bounded to
/// `< .001` and `> .999`.
fn printp(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let values = args.required("p", 0)?.numbers("printp")?;
    let digits = args.number_or("digits", 1, 3.0)?.clamp(1.0, 20.0) as usize;
    if let Some(p) = values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(RuntimeError::invalid_argument(
            "printp",
            format!("{} is not a probability", p),
        ));
    }
    let style = NumberStyle {
        digits,
        gt1: false,
        zero: false,
        big_mark: String::new(),
    };
    let upper = 1.0 - 10f64.powi(-(digits as i32));
    let formatted = values.iter().map(|p| {
        if round_to(*p, digits as i32) > upper {
            format!("> {}", style.strip_zero(&format!("{:.*}", digits, upper)))
        } else {
            style.apply(*p)
        }
    });
    Ok(RuntimeValue::from_strings(formatted.collect::<Vec<_>>()))
}
