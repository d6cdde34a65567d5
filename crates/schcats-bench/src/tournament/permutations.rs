/// Seatings played for every deal. Entry `seat` of a seating names the pairing side
/// (0 = a, 1 = b) sitting in that seat.
pub struct SeatPermutations {
    permutations: Vec<[usize; 2]>,
}

impl SeatPermutations {
    pub fn new(seat_swap: bool) -> Self {
        let mut permutations = vec![[0, 1]];
        if seat_swap {
            permutations.push([1, 0]);
        }
        Self { permutations }
    }

    pub fn as_slice(&self) -> &[[usize; 2]] {
        &self.permutations
    }

    pub fn len(&self) -> usize {
        self.permutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_swap_side_a_always_opens() {
        let perms = SeatPermutations::new(false);
        assert_eq!(perms.as_slice(), &[[0, 1]]);
    }

    #[test]
    fn swap_reverses_seats() {
        let perms = SeatPermutations::new(true);
        assert_eq!(perms.as_slice(), &[[0, 1], [1, 0]]);
        assert_eq!(perms.len(), 2);
    }
}
