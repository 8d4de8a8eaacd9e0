//! Standard rate laws.
//!
//! Argument order follows the usual convention: concentrations first, then
//! kinetic constants.

use crate::function::Function;

/// `k`
pub fn constant() -> Function {
    Function::with_arity("constant", 1, |a| a[0])
}

/// `x * y`
pub fn proportional() -> Function {
    Function::with_arity("proportional", 2, |a| a[0] * a[1])
}

/// `s * kf`
pub fn mass_action_1s() -> Function {
    Function::with_arity("mass_action_1s", 2, |a| a[0] * a[1])
}

/// `s1 * s2 * kf`
pub fn mass_action_2s() -> Function {
    Function::with_arity("mass_action_2s", 3, |a| a[0] * a[1] * a[2])
}

/// `s * vmax / (s + km)`
pub fn michaelis_menten_1s() -> Function {
    Function::with_arity("michaelis_menten_1s", 3, |a| a[0] * a[1] / (a[0] + a[2]))
}

/// `s * kf - p * kr`
pub fn reversible_mass_action_1s_1p() -> Function {
    Function::with_arity("reversible_mass_action_1s_1p", 4, |a| {
        a[0] * a[2] - a[1] * a[3]
    })
}

/// `x / y`
pub fn div() -> Function {
    Function::with_arity("div", 2, |a| a[0] / a[1])
}

/// `total - x`
pub fn moiety_1() -> Function {
    Function::with_arity("moiety_1", 2, |a| a[1] - a[0])
}

/// Sum of all arguments.
pub fn sum() -> Function {
    Function::new("sum", |a| a.iter().sum())
}

/// Product of all arguments.
pub fn product() -> Function {
    Function::new("product", |a| a.iter().product())
}
