// SPDX-License-Identifier: CEPL-1.0
//! Queue-family partitioning.
//!
//! One pass over the device's queue families hands each of the four roles
//! (graphics, compute, transfer, present) to the first family able to serve
//! it. Roles landing on the same family claim consecutive queues of that
//! family; once a family runs out of queues the scan moves on to the next
//! family. Roles no family had a free queue for then share the last claimed
//! queue of the first family that can serve them.

use ash::vk;
use tracing::debug;

use crate::error::RenderError;

/// Descending priority table. Request `n` starts at entry `n` and its later
/// queues walk down the table, clamped at the last entry.
pub const QUEUE_PRIORITIES: [f32; 5] = [1.0, 0.9, 0.8, 0.7, 0.6];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueRole {
  Graphics,
  Compute,
  Transfer,
  Present,
}

impl QueueRole {
  /// Test order. Earlier roles win the lower queue indices of a family.
  pub const ALL: [QueueRole; 4] = [
    QueueRole::Graphics,
    QueueRole::Compute,
    QueueRole::Transfer,
    QueueRole::Present,
  ];

  /// Capability bit the family must expose. Present is a surface query instead.
  pub fn required_flag(self) -> Option<vk::QueueFlags> {
    match self {
      QueueRole::Graphics => Some(vk::QueueFlags::GRAPHICS),
      QueueRole::Compute => Some(vk::QueueFlags::COMPUTE),
      QueueRole::Transfer => Some(vk::QueueFlags::TRANSFER),
      QueueRole::Present => None,
    }
  }
}

/// (family index, queue index within that family)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueIndex {
  pub family: u32,
  pub index: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueAssignment {
  pub graphics: QueueIndex,
  pub compute: QueueIndex,
  pub transfer: QueueIndex,
  pub present: QueueIndex,
}

impl QueueAssignment {
  pub fn get(&self, role: QueueRole) -> QueueIndex {
    match role {
      QueueRole::Graphics => self.graphics,
      QueueRole::Compute => self.compute,
      QueueRole::Transfer => self.transfer,
      QueueRole::Present => self.present,
    }
  }
}

/// How many queues device creation asks for from one family. A zero count
/// marks a family that was scanned but serves no role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueRequest {
  pub family: u32,
  pub count: u32,
}

impl QueueRequest {
  /// `position` is the request's place among the requests sent to the device.
  pub fn priorities(&self, position: usize) -> Vec<f32> {
    let last = QUEUE_PRIORITIES.len() - 1;
    (0..self.count as usize)
      .map(|k| QUEUE_PRIORITIES[(position + k).min(last)])
      .collect()
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuePlan {
  pub assignment: QueueAssignment,
  pub requests: Vec<QueueRequest>,
}

impl QueuePlan {
  /// Requests that actually ask for queues.
  pub fn active_requests(&self) -> impl Iterator<Item = &QueueRequest> {
    self.requests.iter().filter(|r| r.count > 0)
  }

  pub fn log_table(&self) {
    let a = &self.assignment;
    debug!("Queue family index : Queue index ________");
    debug!(" Graphics | Compute | Transfer | Present |");
    debug!(
      "   {}:{}    |   {}:{}   |   {}:{}    |   {}:{}   |",
      a.graphics.family,
      a.graphics.index,
      a.compute.family,
      a.compute.index,
      a.transfer.family,
      a.transfer.index,
      a.present.family,
      a.present.index
    );
    for r in &self.requests {
      debug!("  family {} → {} queue(s)", r.family, r.count);
    }
  }
}

fn eligible(
  role: QueueRole,
  family: &vk::QueueFamilyProperties,
  family_index: u32,
  supports_present: &mut impl FnMut(u32) -> bool,
) -> bool {
  match role.required_flag() {
    Some(flag) => family.queue_flags.contains(flag),
    None => supports_present(family_index),
  }
}

/// Partitions `families` into the four roles.
///
/// `supports_present(i)` is only asked while the present role is still open,
/// and only for families with a queue left to give.
pub fn partition_queue_families(
  families: &[vk::QueueFamilyProperties],
  mut supports_present: impl FnMut(u32) -> bool,
) -> Result<QueuePlan, RenderError> {
  let mut slots: [Option<QueueIndex>; 4] = [None; 4];
  let mut requests = Vec::with_capacity(families.len());

  for (i, family) in families.iter().enumerate() {
    if slots.iter().all(Option::is_some) {
      break;
    }
    let family_index = i as u32;
    let mut claimed = 0u32;

    for (slot, role) in slots.iter_mut().zip(QueueRole::ALL) {
      // exhausted: finalize this family and move on
      if claimed == family.queue_count {
        break;
      }
      if slot.is_some() || !eligible(role, family, family_index, &mut supports_present) {
        continue;
      }
      *slot = Some(QueueIndex {
        family: family_index,
        index: claimed,
      });
      claimed += 1;
    }

    requests.push(QueueRequest {
      family: family_index,
      count: claimed,
    });
  }

  for (slot, role) in slots.iter_mut().zip(QueueRole::ALL) {
    if slot.is_some() {
      continue;
    }
    *slot = requests
      .iter()
      .filter(|r| r.count > 0)
      .find(|r| {
        let family = &families[r.family as usize];
        eligible(role, family, r.family, &mut supports_present)
      })
      .map(|r| QueueIndex {
        family: r.family,
        index: r.count - 1,
      });
  }

  match slots {
    [Some(graphics), Some(compute), Some(transfer), Some(present)] => Ok(QueuePlan {
      assignment: QueueAssignment {
        graphics,
        compute,
        transfer,
        present,
      },
      requests,
    }),
    _ => Err(RenderError::QueueFamiliesNotFound(
      slots
        .iter()
        .zip(QueueRole::ALL)
        .filter(|(slot, _)| slot.is_none())
        .map(|(_, role)| role)
        .collect(),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL_CAPS: vk::QueueFlags = vk::QueueFlags::from_raw(
    vk::QueueFlags::GRAPHICS.as_raw()
      | vk::QueueFlags::COMPUTE.as_raw()
      | vk::QueueFlags::TRANSFER.as_raw(),
  );

  fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
      queue_flags: flags,
      queue_count: count,
      ..Default::default()
    }
  }

  fn present_on(families: &'static [u32]) -> impl FnMut(u32) -> bool {
    move |i| families.contains(&i)
  }

  #[test]
  fn single_family_single_queue_serves_every_role() {
    let families = [family(ALL_CAPS, 1)];
    let plan = partition_queue_families(&families, present_on(&[0])).unwrap();

    for role in QueueRole::ALL {
      assert_eq!(plan.assignment.get(role), QueueIndex { family: 0, index: 0 });
    }
    assert_eq!(plan.requests, vec![QueueRequest { family: 0, count: 1 }]);
  }

  #[test]
  fn roles_claim_consecutive_queues_of_a_roomy_family() {
    let families = [family(ALL_CAPS, 16)];
    let plan = partition_queue_families(&families, present_on(&[0])).unwrap();

    let a = plan.assignment;
    assert_eq!(a.graphics, QueueIndex { family: 0, index: 0 });
    assert_eq!(a.compute, QueueIndex { family: 0, index: 1 });
    assert_eq!(a.transfer, QueueIndex { family: 0, index: 2 });
    assert_eq!(a.present, QueueIndex { family: 0, index: 3 });
    assert_eq!(plan.requests, vec![QueueRequest { family: 0, count: 4 }]);
    assert_eq!(plan.requests[0].priorities(0), vec![1.0, 0.9, 0.8, 0.7]);
  }

  #[test]
  fn exhausted_family_shares_its_last_queue() {
    let families = [family(ALL_CAPS, 2)];
    let plan = partition_queue_families(&families, present_on(&[0])).unwrap();

    let a = plan.assignment;
    assert_eq!(a.graphics.index, 0);
    assert_eq!(a.compute.index, 1);
    assert_eq!(a.transfer.index, 1);
    assert_eq!(a.present.index, 1);
    assert_eq!(plan.requests, vec![QueueRequest { family: 0, count: 2 }]);
  }

  #[test]
  fn exhausted_family_hands_later_roles_to_the_next_family() {
    let families = [
      family(ALL_CAPS, 1),
      family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 4),
    ];
    let plan = partition_queue_families(&families, |_| true).unwrap();

    let a = plan.assignment;
    assert_eq!(a.graphics, QueueIndex { family: 0, index: 0 });
    assert_eq!(a.compute, QueueIndex { family: 1, index: 0 });
    assert_eq!(a.transfer, QueueIndex { family: 1, index: 1 });
    assert_eq!(a.present, QueueIndex { family: 1, index: 2 });
    assert_eq!(
      plan.requests,
      vec![
        QueueRequest { family: 0, count: 1 },
        QueueRequest { family: 1, count: 3 },
      ]
    );
  }

  #[test]
  fn roles_without_a_free_queue_share_the_first_eligible_family() {
    let families = [
      family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
      family(vk::QueueFlags::TRANSFER, 1),
    ];
    let plan = partition_queue_families(&families, present_on(&[0])).unwrap();

    let a = plan.assignment;
    assert_eq!(a.graphics, QueueIndex { family: 0, index: 0 });
    assert_eq!(a.compute, QueueIndex { family: 0, index: 0 });
    assert_eq!(a.transfer, QueueIndex { family: 1, index: 0 });
    assert_eq!(a.present, QueueIndex { family: 0, index: 0 });
    assert_eq!(
      plan.requests,
      vec![
        QueueRequest { family: 0, count: 1 },
        QueueRequest { family: 1, count: 1 },
      ]
    );
  }

  #[test]
  fn each_request_starts_lower_in_the_priority_table() {
    let first = QueueRequest { family: 0, count: 2 };
    let second = QueueRequest { family: 1, count: 3 };
    let late = QueueRequest { family: 7, count: 2 };

    assert_eq!(first.priorities(0), vec![1.0, 0.9]);
    assert_eq!(second.priorities(1), vec![0.9, 0.8, 0.7]);
    assert_eq!(late.priorities(6), vec![0.6, 0.6]);
    assert_ne!(first.priorities(0)[0], second.priorities(1)[0]);
  }

  #[test]
  fn scanning_stops_once_every_role_is_assigned() {
    let families = [
      family(ALL_CAPS, 16),
      family(vk::QueueFlags::TRANSFER, 2),
      family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8),
    ];
    let mut asked = Vec::new();
    let plan = partition_queue_families(&families, |i| {
      asked.push(i);
      true
    })
    .unwrap();

    assert_eq!(plan.requests.len(), 1);
    assert_eq!(asked, vec![0]);
  }

  #[test]
  fn roles_spread_over_specialised_families() {
    let families = [
      family(vk::QueueFlags::GRAPHICS, 1),
      family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 2),
      family(vk::QueueFlags::empty(), 1),
    ];
    let plan = partition_queue_families(&families, present_on(&[2])).unwrap();

    let a = plan.assignment;
    assert_eq!(a.graphics, QueueIndex { family: 0, index: 0 });
    assert_eq!(a.compute, QueueIndex { family: 1, index: 0 });
    assert_eq!(a.transfer, QueueIndex { family: 1, index: 1 });
    assert_eq!(a.present, QueueIndex { family: 2, index: 0 });
    assert_eq!(
      plan.requests,
      vec![
        QueueRequest { family: 0, count: 1 },
        QueueRequest { family: 1, count: 2 },
        QueueRequest { family: 2, count: 1 },
      ]
    );
  }

  #[test]
  fn family_serving_no_role_still_gets_an_empty_request() {
    let families = [
      family(ALL_CAPS, 4),
      family(vk::QueueFlags::TRANSFER, 1),
      family(vk::QueueFlags::empty(), 1),
    ];
    let plan = partition_queue_families(&families, present_on(&[2])).unwrap();

    assert_eq!(
      plan.requests,
      vec![
        QueueRequest { family: 0, count: 3 },
        QueueRequest { family: 1, count: 0 },
        QueueRequest { family: 2, count: 1 },
      ]
    );
    assert_eq!(plan.active_requests().count(), 2);
    assert!(plan.requests[1].priorities(1).is_empty());
  }

  #[test]
  fn present_is_only_queried_while_unassigned() {
    let families = [
      family(vk::QueueFlags::GRAPHICS, 1),
      family(vk::QueueFlags::empty(), 1),
      family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 2),
    ];
    let mut asked = Vec::new();
    partition_queue_families(&families, |i| {
      asked.push(i);
      i == 1
    })
    .unwrap();

    // family 0 is used up by graphics, family 1 takes present, family 2 is never asked
    assert_eq!(asked, vec![1]);
  }

  #[test]
  fn missing_roles_are_reported() {
    let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 2)];
    let err = partition_queue_families(&families, |_| false).unwrap_err();

    match err {
      RenderError::QueueFamiliesNotFound(missing) => {
        assert_eq!(missing, vec![QueueRole::Compute, QueueRole::Present]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn empty_family_list_fails() {
    assert!(partition_queue_families(&[], |_| true).is_err());
  }

  #[test]
  fn zero_queue_family_is_skipped() {
    let families = [family(ALL_CAPS, 0), family(ALL_CAPS, 1)];
    let plan = partition_queue_families(&families, |_| true).unwrap();

    assert_eq!(plan.assignment.graphics.family, 1);
    assert_eq!(
      plan.requests,
      vec![
        QueueRequest { family: 0, count: 0 },
        QueueRequest { family: 1, count: 1 },
      ]
    );
  }

  #[test]
  fn identical_input_gives_identical_plan() {
    let families = [
      family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 2),
      family(vk::QueueFlags::TRANSFER, 1),
      family(ALL_CAPS, 3),
    ];
    let first = partition_queue_families(&families, present_on(&[1, 2])).unwrap();
    for _ in 0..8 {
      let again = partition_queue_families(&families, present_on(&[1, 2])).unwrap();
      assert_eq!(again, first);
    }
  }

  #[test]
  fn assigned_families_always_satisfy_their_role() {
    let flag_choices = [
      vk::QueueFlags::empty(),
      vk::QueueFlags::GRAPHICS,
      vk::QueueFlags::COMPUTE,
      vk::QueueFlags::TRANSFER,
      vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
      ALL_CAPS,
    ];

    let mut successes = 0;
    for a in flag_choices {
      for b in flag_choices {
        for counts in [(1, 1), (1, 3), (4, 1)] {
          for present_mask in 0u32..4 {
            let families = [family(a, counts.0), family(b, counts.1)];
            let present = |i: u32| present_mask & (1 << i) != 0;
            let Ok(plan) = partition_queue_families(&families, present) else {
              continue;
            };
            successes += 1;

            assert!(plan.requests.len() <= families.len());
            for role in QueueRole::ALL {
              let q = plan.assignment.get(role);
              let props = &families[q.family as usize];
              match role.required_flag() {
                Some(flag) => assert!(props.queue_flags.contains(flag)),
                None => assert!(present(q.family)),
              }
              let request = plan
                .requests
                .iter()
                .find(|r| r.family == q.family)
                .expect("assigned family has a request");
              assert!(q.index < request.count);
              assert!(request.count <= props.queue_count);
            }
          }
        }
      }
    }
    assert!(successes > 0);
  }
}
