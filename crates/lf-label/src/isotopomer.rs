//! Bitmask-indexed isotopomer arenas.

/// Label string of `mask` over `positions` positions, position 0 first.
///
/// ```
/// assert_eq!(lf_label::label_string(0b001, 3), "100");
/// assert_eq!(lf_label::label_string(0b110, 3), "011");
/// ```
pub fn label_string(mask: usize, positions: usize) -> String {
    (0..positions)
        .map(|i| if (mask >> i) & 1 == 1 { '1' } else { '0' })
        .collect()
}

/// Every variant of one labeled variable, indexed by bitmask.
///
/// Bit `i` of the index is set when position `i` carries the label.
#[derive(Debug, Clone, PartialEq)]
pub struct Isotopomers {
    base: String,
    positions: usize,
    names: Vec<String>,
}

impl Isotopomers {
    pub fn new(base: &str, positions: usize) -> Self {
        let names = (0..1usize << positions)
            .map(|mask| format!("{base}__{}", label_string(mask, positions)))
            .collect();
        Self {
            base: base.to_string(),
            positions,
            names,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All variant names in bitmask order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, mask: usize) -> &str {
        &self.names[mask]
    }

    /// Name of the derived sum over all variants.
    pub fn total_name(&self) -> String {
        format!("{}__total", self.base)
    }

    /// Variants labeled at every position in `positions`, in bitmask order.
    pub fn at_positions(&self, positions: &[usize]) -> Vec<&str> {
        let required = positions.iter().fold(0usize, |acc, &p| acc | (1 << p));
        self.names
            .iter()
            .enumerate()
            .filter(|(mask, _)| mask & required == required)
            .map(|(_, n)| n.as_str())
            .collect()
    }

    /// Variants with exactly `n` labeled positions, in bitmask order.
    pub fn with_n_labels(&self, n: usize) -> Vec<&str> {
        self.names
            .iter()
            .enumerate()
            .filter(|(mask, _)| mask.count_ones() as usize == n)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}
