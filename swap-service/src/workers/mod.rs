pub mod xp_awards;
