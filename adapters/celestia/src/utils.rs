/// Returns the largest power of 2 that is less than or equal to the input.
/// Examples:
///   - round_down_power_of_two(2): 2
///   - round_down_power_of_two(3): 2
///   - round_down_power_of_two(7): 4
///   - round_down_power_of_two(8): 8
///
/// Returns 0 for an input of 0.
pub(crate) fn round_down_power_of_two(num: usize) -> usize {
    if num == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - num.leading_zeros())
}
