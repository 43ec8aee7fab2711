// Single-octave lattice gradient noise shared by the 2D and 3D samplers

// The 12-direction 3D gradient set peaks at ~1.036, pull it back inside [-1, 1]
const NOISE3_NORMALIZER: f64 = 0.96;

/// Seeded permutation table plus the classic fade/lerp/gradient construction.
#[derive(Clone)]
pub struct Perlin {
    perm: [u8; 512], // permutation table (256 duplicated)
}

impl Perlin {
    pub fn new(seed: i64) -> Self {
        let mut p: Vec<u8> = (0..256).map(|i| i as u8).collect();
        // xorshift must never start from zero
        let mut x = mix64(seed as u64 ^ 0xDEADBEEFCAFEBABE_u64) | 1;
        let mut rng = || {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x
        };
        // Fisher–Yates shuffle p[0..256]
        for i in (1..256).rev() {
            let j = (rng() % (i as u64 + 1)) as usize;
            p.swap(i, j);
        }
        // Duplicate into 512 so corner hashes never need a modulo
        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = p[i & 255];
        }

        Self { perm }
    }

    // 6t^5 − 15t^4 + 10t^3, zero first and second derivative at both ends
    #[inline]
    fn fade(t: f64) -> f64 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    #[inline]
    fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + t * (b - a)
    }

    // Diagonal gradients (±1, ±1) dotted with the offset
    #[inline]
    fn grad2(hash: u8, x: f64, y: f64) -> f64 {
        let h = hash & 0x3;
        let u = if (h & 1) == 0 { x } else { -x };
        let v = if (h & 2) == 0 { y } else { -y };
        u + v
    }

    // Low 4 bits select one of the 12 cube-edge directions
    #[inline]
    fn grad3(hash: u8, x: f64, y: f64, z: f64) -> f64 {
        let h = (hash & 0xF) as usize;
        let u = if h < 8 { x } else { y };
        let v = if h < 4 {
            y
        } else if h == 12 || h == 14 {
            x
        } else {
            z
        };
        let sign_u = if (h & 1) == 0 { u } else { -u };
        let sign_v = if (h & 2) == 0 { v } else { -v };
        sign_u + sign_v
    }

    #[inline]
    fn hash2(&self, x: usize, y: usize) -> u8 {
        self.perm[self.perm[x] as usize + y]
    }

    #[inline]
    fn hash3(&self, x: usize, y: usize, z: usize) -> u8 {
        self.perm[self.perm[self.perm[x] as usize + y] as usize + z]
    }

    /// Raw 2D noise in [-1, 1]. A `Some(p)` period repeats the lattice every `p` cells.
    pub fn noise2(&self, x: f64, y: f64, period: [Option<i64>; 2]) -> f64 {
        let (x0, x1, xf) = lattice(x, period[0]);
        let (y0, y1, yf) = lattice(y, period[1]);
        let u = Self::fade(xf);
        let v = Self::fade(yf);

        let aa = self.hash2(x0, y0);
        let ab = self.hash2(x0, y1);
        let ba = self.hash2(x1, y0);
        let bb = self.hash2(x1, y1);

        let x1v = Self::lerp(Self::grad2(aa, xf, yf), Self::grad2(ba, xf - 1.0, yf), u);
        let x2v = Self::lerp(
            Self::grad2(ab, xf, yf - 1.0),
            Self::grad2(bb, xf - 1.0, yf - 1.0),
            u,
        );
        Self::lerp(x1v, x2v, v)
    }

    /// Raw 3D noise in [-1, 1], periodic per axis like [`Perlin::noise2`].
    pub fn noise3(&self, x: f64, y: f64, z: f64, period: [Option<i64>; 3]) -> f64 {
        let (x0, x1, xf) = lattice(x, period[0]);
        let (y0, y1, yf) = lattice(y, period[1]);
        let (z0, z1, zf) = lattice(z, period[2]);
        let u = Self::fade(xf);
        let v = Self::fade(yf);
        let w = Self::fade(zf);

        let aaa = self.hash3(x0, y0, z0);
        let aba = self.hash3(x0, y1, z0);
        let aab = self.hash3(x0, y0, z1);
        let abb = self.hash3(x0, y1, z1);
        let baa = self.hash3(x1, y0, z0);
        let bba = self.hash3(x1, y1, z0);
        let bab = self.hash3(x1, y0, z1);
        let bbb = self.hash3(x1, y1, z1);

        let x1v = Self::lerp(
            Self::grad3(aaa, xf, yf, zf),
            Self::grad3(baa, xf - 1.0, yf, zf),
            u,
        );
        let x2v = Self::lerp(
            Self::grad3(aba, xf, yf - 1.0, zf),
            Self::grad3(bba, xf - 1.0, yf - 1.0, zf),
            u,
        );
        let y1v = Self::lerp(x1v, x2v, v);

        let x3v = Self::lerp(
            Self::grad3(aab, xf, yf, zf - 1.0),
            Self::grad3(bab, xf - 1.0, yf, zf - 1.0),
            u,
        );
        let x4v = Self::lerp(
            Self::grad3(abb, xf, yf - 1.0, zf - 1.0),
            Self::grad3(bbb, xf - 1.0, yf - 1.0, zf - 1.0),
            u,
        );
        let y2v = Self::lerp(x3v, x4v, v);

        Self::lerp(y1v, y2v, w) * NOISE3_NORMALIZER
    }
}

// Split a noise-space coordinate into its two (wrapped) corner indices and the
// fractional offset inside the cell. The cell is reduced while still a float so
// coordinates beyond the i64 range never reach integer arithmetic.
#[inline]
fn lattice(coord: f64, period: Option<i64>) -> (usize, usize, f64) {
    let cell = coord.floor();
    let frac = coord - cell;
    let p = period.unwrap_or(256);
    let i0 = (cell.rem_euclid(p as f64) as i64).rem_euclid(p);
    let i1 = i0.wrapping_add(1).rem_euclid(p);
    ((i0 & 255) as usize, (i1 & 255) as usize, frac)
}

/// SplitMix64 finalizer, used wherever a seed has to be turned into well-spread bits.
#[inline]
pub(crate) fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::Perlin;

    #[test]
    fn zero_at_lattice_points() {
        let p = Perlin::new(5);
        for &(x, y, z) in &[(0.0, 0.0, 0.0), (3.0, -7.0, 12.0), (-100.0, 4.0, 1.0)] {
            assert!(p.noise3(x, y, z, [None; 3]).abs() < 1e-12);
            assert!(p.noise2(x, y, [None; 2]).abs() < 1e-12);
        }
    }

    #[test]
    fn raw_range() {
        let p = Perlin::new(99);
        for i in 0..2000 {
            let t = i as f64 * 0.137;
            let v2 = p.noise2(t, t * 0.61 - 40.0, [None; 2]);
            let v3 = p.noise3(t * 0.3, -t, t * 1.7 + 3.3, [None; 3]);
            assert!(v2.abs() <= 1.0 + 1e-9, "2D value {v2} out of range");
            assert!(v3.abs() <= 1.0 + 1e-9, "3D value {v3} out of range");
        }
    }

    #[test]
    fn seeds_differ() {
        let a = Perlin::new(1);
        let b = Perlin::new(2);
        let differs = (0..50).any(|i| {
            let t = i as f64 * 0.731 + 0.25;
            (a.noise3(t, t * 0.5, -t, [None; 3]) - b.noise3(t, t * 0.5, -t, [None; 3])).abs() > 1e-9
        });
        assert!(differs);
    }

    #[test]
    fn huge_coordinates_stay_finite() {
        let p = Perlin::new(42);
        for &x in &[1e19, -1e19, 9.3e18, 1e300, -1e300, f64::MAX, f64::MIN] {
            let v2 = p.noise2(x, 0.5, [None; 2]);
            let v3 = p.noise3(x, 0.5, -x, [None; 3]);
            assert!(v2.is_finite() && v2.abs() <= 1.0 + 1e-9, "{v2}");
            assert!(v3.is_finite() && v3.abs() <= 1.0 + 1e-9, "{v3}");
            let w = p.noise3(x, 0.5, x, [Some(4), Some(6), Some(8)]);
            assert!(w.is_finite());
        }
    }

    #[test]
    fn float_reduction_matches_integer_lattice() {
        // below 2^53 the float reduction picks the same corners as i64 math would
        for &c in &[-513.0, -1.0, -0.25, 0.0, 255.5, 256.0, 1e6 + 0.5] {
            let (i0, i1, _) = super::lattice(c, None);
            let i = c.floor() as i64;
            assert_eq!(i0, (i & 255) as usize);
            assert_eq!(i1, ((i + 1) & 255) as usize);
        }
        let (i0, i1, _) = super::lattice(-1.5, Some(5));
        assert_eq!((i0, i1), (3, 4));
        let (i0, i1, _) = super::lattice(4.5, Some(5));
        assert_eq!((i0, i1), (4, 0));
    }

    #[test]
    fn wrapped_lattice_repeats() {
        let p = Perlin::new(3);
        let period = [Some(4), Some(6)];
        for i in 0..40 {
            let x = i as f64 * 0.29 - 3.0;
            let y = i as f64 * 0.17 + 1.0;
            let a = p.noise2(x, y, period);
            let b = p.noise2(x + 4.0, y, period);
            let c = p.noise2(x, y - 6.0, period);
            assert!((a - b).abs() < 1e-9);
            assert!((a - c).abs() < 1e-9);
        }
    }
}
