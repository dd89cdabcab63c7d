//! Reach Rollout Example
//!
//! Runs a batch of reach tasks with a simple proportional controller that
//! drives each tool tip toward its goal, resetting only the instances that
//! finished.
//!
//! ## What it shows
//! - Building a batch from an `EnvConfig`
//! - Masked resets with `ResetOptions::with_env_idx`
//! - Reading `success` from step info

use ndarray::Array2;
use simbatch::tasks::ReachTarget;
use simbatch::{BaseEnv, EnvConfig, ObsMode, ResetOptions, Result, RewardMode};

const NUM_ENVS: usize = 8;
const STEPS: usize = 200;
const GAIN: f32 = 4.0;

fn main() -> Result<()> {
    let config = EnvConfig::new(NUM_ENVS)
        .with_obs_mode(ObsMode::StateDict)
        .with_reward_mode(RewardMode::Dense)
        .with_reconfiguration_freq(0);
    let mut env = BaseEnv::new(ReachTarget::new(), config)?;

    let (mut obs, _) = env.reset(Some(42), ResetOptions::new())?;
    println!(
        "Reach rollout: {} instances on {:?} device, {} substeps per step",
        env.num_envs(),
        env.device_kind(),
        env.sim_config().substeps()
    );

    let mut episodes = 0usize;
    let mut return_sum = 0.0f32;
    let mut returns = vec![0.0f32; NUM_ENVS];

    for step in 0..STEPS {
        // Delta joint action proportional to the tip-to-goal offset.
        let offset = obs
            .get_path("extra/tcp_to_goal_pos")
            .and_then(|v| v.as_f32())
            .cloned()
            .unwrap_or_else(|| Array2::<f32>::zeros((NUM_ENVS, 3)).into_dyn());
        let action = offset.mapv(|d| (GAIN * d).clamp(-1.0, 1.0));

        let out = env.step(action)?;
        for (ret, r) in returns.iter_mut().zip(out.reward.iter()) {
            *ret += r;
        }

        let done: Vec<usize> = out
            .dones()
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| d.then_some(i))
            .collect();
        obs = out.obs;
        if done.is_empty() {
            continue;
        }

        for &i in &done {
            episodes += 1;
            return_sum += returns[i];
            returns[i] = 0.0;
        }
        println!("step {:>3}: {} instance(s) reached the goal", step, done.len());
        // A masked reset returns the full batch observation.
        let (next, _) = env.reset(None, ResetOptions::new().with_env_idx(done))?;
        obs = next;
    }

    if episodes > 0 {
        println!(
            "Finished {} episodes, mean return {:.3}",
            episodes,
            return_sum / episodes as f32
        );
    } else {
        println!("No episode finished in {} steps", STEPS);
    }

    env.close();
    Ok(())
}
