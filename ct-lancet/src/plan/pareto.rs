//! 帕累托前沿提取与单点择优.

/// 标记每行是否位于帕累托前沿.
///
/// 行 A 支配行 B 当且仅当 A 三列全部不劣于 B 且至少一列严格更优;
/// 前沿即不被任何其他行支配的行集合. 完全相同的两行互不支配,
/// 因此会一同留在前沿里.
pub fn pareto_front(rows: &[[f64; 3]]) -> Vec<bool> {
    (0..rows.len())
        .map(|i| {
            !rows
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && dominates(other, &rows[i]))
        })
        .collect()
}

#[inline]
fn dominates(a: &[f64; 3], b: &[f64; 3]) -> bool {
    a.iter().zip(b).all(|(x, y)| x <= y) && a.iter().zip(b).any(|(x, y)| x < y)
}

/// 在帕累托前沿内选出无权均值最小的一行, 返回其行号.
///
/// 均值并列时 `min_by_key` 保证取输入序靠前者. 空输入返回 `None`.
pub fn select(rows: &[[f64; 3]]) -> Option<usize> {
    use ordered_float::NotNan;

    let front = pareto_front(rows);
    rows.iter()
        .enumerate()
        .filter(|&(i, _)| front[i])
        .min_by_key(|&(_, r)| {
            // 归一化分值有限且非 NaN.
            NotNan::<f64>::new((r[0] + r[1] + r[2]) / 3.0).unwrap()
        })
        .map(|(i, _)| i)
}
