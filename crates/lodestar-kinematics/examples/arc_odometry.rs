use lodestar_kinematics::*;

fn main() {
    let track_width = 12.0;
    let kinematics_result = DifferentialDrive::new(track_width);

    let mut current_pose = Pose::new(0.0, 0.0, 0.0);
    let wheel_speeds = WheelSpeeds::new(20.0, 30.0); // in/s, right side faster so the robot curves left
    let dt = 0.1; // Time step in seconds
    let num_steps = 20;

    match kinematics_result {
        Ok(kinematics) => {
            let chassis_speeds = kinematics.forward_kinematics(wheel_speeds);
            println!("Initializing simulation...");
            println!("  Differential Drive Parameters:");
            println!("    Track Width:  {} in", kinematics.track_width());
            println!("  Initial State:");
            println!("    Pose:         {}", current_pose);
            println!("    Wheel Speeds: {}", wheel_speeds);
            println!("    Chassis:      {}", chassis_speeds);
            println!("  Simulation Settings:");
            println!("    Time Step:    {} s", dt);
            println!("    Num Steps:    {}", num_steps);
            println!("\nSimulating...");

            for i in 0..num_steps {
                match kinematics.update_pose(current_pose, chassis_speeds, dt) {
                    Ok(new_pose) => {
                        current_pose = new_pose;
                        println!("Step {:>2}: Pose: {}", i + 1, current_pose);
                    }
                    Err(e) => {
                        eprintln!("Error during simulation step {}: {}", i + 1, e);
                        break;
                    }
                }
            }

            // The same motion integrated as a single arc lands in the same place.
            let elapsed = dt * num_steps as f64;
            let local = local_chords((chassis_speeds.v * elapsed, 0.0), None, chassis_speeds.omega * elapsed);
            let single = integrate(Pose::origin(), local);

            println!("\nSimulation complete.");
            println!("Final Pose (stepped):    {}", current_pose);
            println!("Final Pose (single arc): {}", single);
            println!("Difference: {:.2e} in", current_pose.distance(&single));
        }
        Err(e) => {
            eprintln!("Failed to initialize kinematics: {}", e);
            eprintln!("Please ensure track_width ({}) is positive.", track_width);
        }
    }
}
