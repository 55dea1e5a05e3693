use rand::seq::SliceRandom;
use rand::Rng;

const HEADLINES: [&str; 5] = ["TOP DOG!", "BEST IN SHOW!", "GOOD BOY!", "WOOF WOOF!", "PAWSOME!"];
const CONFETTI: [char; 6] = ['*', '+', 'o', '.', '~', '#'];
const GRAVITY: f64 = 12.0;

/// One animated glyph on the leaderboard screen
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
    /// Letters of the headline glide to `target` and stay; confetti falls
    pub target: Option<(f64, f64)>,
}

impl Particle {
    fn confetti<R: Rng + ?Sized>(x: f64, y: f64, rng: &mut R) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-3.0..3.0),
            vel_y: rng.gen_range(-5.0..-1.5),
            symbol: *CONFETTI.choose(rng).unwrap_or(&'*'),
            color_index: rng.gen_range(0..6),
            age: 0.0,
            max_age: rng.gen_range(2.0..4.0),
            target: None,
        }
    }

    fn letter(from: (f64, f64), to: (f64, f64), symbol: char, color_index: usize) -> Self {
        Self {
            x: from.0,
            y: from.1,
            vel_x: to.0 - from.0,
            vel_y: to.1 - from.1,
            symbol,
            color_index,
            age: 0.0,
            max_age: f64::INFINITY,
            target: Some(to),
        }
    }

    pub fn is_letter(&self) -> bool {
        self.target.is_some()
    }

    fn update(&mut self, dt: f64) -> bool {
        match self.target {
            Some((tx, ty)) => {
                let dist = ((tx - self.x).powi(2) + (ty - self.y).powi(2)).sqrt();
                if dist > 0.5 {
                    self.x += self.vel_x * dt;
                    self.y += self.vel_y * dt;
                } else {
                    self.x = tx;
                    self.y = ty;
                    self.vel_x = 0.0;
                    self.vel_y = 0.0;
                }
            }
            None => {
                self.x += self.vel_x * dt;
                self.y += self.vel_y * dt;
                self.vel_y += GRAVITY * dt;
            }
        }
        self.age += dt;
        self.age < self.max_age
    }
}

/// Confetti plus a headline that assembles itself when the leaderboard opens
#[derive(Debug)]
pub struct Celebration {
    pub particles: Vec<Particle>,
    pub headline: &'static str,
    pub elapsed: f64,
    pub duration: f64,
    pub is_active: bool,
    width: f64,
    height: f64,
}

impl Celebration {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            headline: HEADLINES[0],
            elapsed: 0.0,
            duration: 4.0,
            is_active: false,
            width: 80.0,
            height: 24.0,
        }
    }

    pub fn start<R: Rng + ?Sized>(&mut self, width: u16, height: u16, rng: &mut R) {
        self.particles.clear();
        self.elapsed = 0.0;
        self.is_active = true;
        self.width = width as f64;
        self.height = height as f64;
        self.headline = HEADLINES.choose(rng).copied().unwrap_or(HEADLINES[0]);

        let center = (self.width / 2.0, self.height / 3.0);
        let spacing = 2.0;
        let span = (self.headline.chars().count() as f64 - 1.0) * spacing;
        for (i, ch) in self.headline.chars().enumerate() {
            if ch == ' ' {
                continue;
            }
            let to = (center.0 - span / 2.0 + i as f64 * spacing, center.1);
            let from = (
                center.0 + rng.gen_range(-12.0..12.0),
                center.1 + rng.gen_range(-6.0..6.0),
            );
            self.particles
                .push(Particle::letter(from, to, ch, rng.gen_range(0..6)));
        }

        for _ in 0..30 {
            let x = center.0 + rng.gen_range(-18.0..18.0);
            let y = center.1 + rng.gen_range(-4.0..4.0);
            self.particles.push(Particle::confetti(x, y, rng));
        }
    }

    /// Advance the animation by `dt` seconds
    pub fn update(&mut self, dt: f64) {
        if !self.is_active {
            return;
        }
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            // keep the finished headline, drop the confetti
            self.is_active = false;
            self.particles.retain(Particle::is_letter);
            for p in &mut self.particles {
                if let Some((tx, ty)) = p.target {
                    p.x = tx;
                    p.y = ty;
                }
            }
            return;
        }

        let (width, height) = (self.width, self.height);
        self.particles.retain_mut(|p| {
            let alive = p.update(dt);
            let margin = 4.0;
            let off_screen = p.y > height + margin || p.x < -margin || p.x > width + margin;
            alive && (p.is_letter() || !off_screen)
        });
    }
}

impl Default for Celebration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn confetti_falls() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut p = Particle::confetti(10.0, 10.0, &mut rng);
        let vel_y = p.vel_y;
        assert!(p.update(0.1));
        assert!(p.vel_y > vel_y);
    }

    #[test]
    fn letters_settle_on_target() {
        let mut p = Particle::letter((0.0, 0.0), (10.0, 4.0), 'W', 0);
        for _ in 0..40 {
            assert!(p.update(0.1));
        }
        assert_eq!((p.x, p.y), (10.0, 4.0));
    }

    #[test]
    fn start_spells_the_headline() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut celebration = Celebration::new();
        assert!(!celebration.is_active);

        celebration.start(80, 24, &mut rng);
        assert!(celebration.is_active);
        let letters: String = celebration
            .particles
            .iter()
            .filter(|p| p.is_letter())
            .map(|p| p.symbol)
            .collect();
        assert_eq!(letters, celebration.headline.replace(' ', ""));
        assert!(celebration.particles.iter().any(|p| !p.is_letter()));
    }

    #[test]
    fn confetti_leaves_the_screen() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut celebration = Celebration::new();
        celebration.start(20, 10, &mut rng);
        celebration.particles.push(Particle::confetti(100.0, 100.0, &mut rng));
        celebration.update(0.1);
        assert!(celebration
            .particles
            .iter()
            .all(|p| p.is_letter() || p.x <= 24.0));
    }

    #[test]
    fn headline_remains_after_the_show() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut celebration = Celebration::new();
        celebration.start(80, 24, &mut rng);
        for _ in 0..50 {
            celebration.update(0.1);
        }
        assert!(!celebration.is_active);
        assert!(!celebration.particles.is_empty());
        assert!(celebration.particles.iter().all(Particle::is_letter));
    }
}
