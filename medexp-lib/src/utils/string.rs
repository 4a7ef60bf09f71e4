use unicode_normalization::UnicodeNormalization as _;

/// Length of a form field as the user perceives it: one per character, not per byte.
pub fn char_length(value: &str) -> usize {
    value.chars().count()
}

/// Key used for name ordering.
///
/// NFKC folds half-width katakana and full-width latin into their canonical
/// forms, so `ﾀﾛｳ` sorts next to `タロウ` and `ＴＡＲＯ` next to `taro`.
pub fn collation_key(value: &str) -> String {
    value.nfkc().flat_map(|c| c.to_lowercase()).collect()
}
