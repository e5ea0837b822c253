/// Returns the contiguous block of `items` that belongs to `team_number`.
///
/// The list is cut into `team_count` blocks in order; the first
/// `len % team_count` teams get one extra item. Teams past the end of the list
/// get an empty slice, as does an out-of-range team number.
pub fn distribute<T>(items: &[T], team_count: u32, team_number: u32) -> &[T] {
    if team_count == 0 || team_number == 0 || team_number > team_count {
        return &[];
    }
    let teams = team_count as usize;
    let idx = (team_number - 1) as usize;
    let base = items.len() / teams;
    let remainder = items.len() % teams;
    let start = idx * base + idx.min(remainder);
    let len = if idx < remainder { base + 1 } else { base };
    &items[start..start + len]
}
