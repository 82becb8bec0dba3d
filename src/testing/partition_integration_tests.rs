//! Integration tests for partition assignment across multiple instances.
//!
//! Each "instance" here is its own partition service fed the same membership
//! snapshot, which is exactly how peers behave in production: no
//! coordination, identical inputs, identical conclusions.

#[cfg(test)]
mod tests {
    use crate::config::PartitionSettings;
    use crate::partition::service::PartitionService;
    use crate::testing::utils::{isolated_service_info, partition_service_for, service_info};
    use crate::types::{EntityId, ServiceKey, ServiceType, TenantId};
    use std::collections::{HashMap, HashSet};
    use uuid::Uuid;

    fn core_settings() -> PartitionSettings {
        PartitionSettings::default()
    }

    /// Compute `partition → owner service id` for a set of core instances,
    /// asserting on the way that ownership is a partition of the space.
    fn ownership_map(ids: &[&str], settings: &PartitionSettings) -> HashMap<u32, String> {
        let infos: Vec<_> = ids
            .iter()
            .map(|id| service_info(id, &[ServiceType::TbCore]))
            .collect();

        let mut owners: HashMap<u32, String> = HashMap::new();
        for (i, info) in infos.iter().enumerate() {
            let others: Vec<_> = infos
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, o)| o.clone())
                .collect();
            let (service, _) = partition_service_for(info, settings);
            service.recalculate_partitions(info, &others);

            for tpi in service.get_current_partitions(ServiceType::TbCore) {
                let partition = tpi.partition.unwrap();
                let previous = owners.insert(partition, info.service_id.clone());
                assert!(
                    previous.is_none(),
                    "partition {partition} claimed by both {:?} and {}",
                    previous,
                    info.service_id
                );
            }
        }
        assert_eq!(
            owners.len(),
            settings.core_partitions as usize,
            "every partition must have exactly one owner"
        );
        owners
    }

    #[test]
    fn test_solo_cluster_owns_all_partitions() {
        let info = service_info("core-1", &[ServiceType::TbCore]);
        let (service, recorder) = partition_service_for(&info, &core_settings());
        service.recalculate_partitions(&info, &[]);

        let owned = service.get_current_partitions(ServiceType::TbCore);
        assert_eq!(owned.len(), 100);

        let tpi = service
            .resolve(
                ServiceType::TbCore,
                TenantId::SYSTEM,
                EntityId::new(Uuid::nil()),
            )
            .unwrap();
        assert!(tpi.my_partition);
        assert!(tpi.partition.unwrap() < 100);

        // First recomputation: ownership appears, but no topology event.
        assert_eq!(recorder.partition_changes().len(), 1);
        assert!(recorder.topology_changes().is_empty());
    }

    #[test]
    fn test_two_peer_symmetry() {
        let owners = ownership_map(&["core-a", "core-b"], &core_settings());

        let a_count = owners.values().filter(|id| id.as_str() == "core-a").count();
        let b_count = owners.values().filter(|id| id.as_str() == "core-b").count();
        assert_eq!(a_count + b_count, 100);
        assert!(a_count > 0, "core-a owns nothing");
        assert!(b_count > 0, "core-b owns nothing");
    }

    #[test]
    fn test_isolated_tenant_has_its_own_ring() {
        let tenant = TenantId::new(Uuid::new_v4());
        let info = service_info("core-1", &[ServiceType::TbCore]);
        let dedicated = isolated_service_info("core-t1", &[ServiceType::TbCore], tenant);

        let (service, _) = partition_service_for(&info, &core_settings());
        service.recalculate_partitions(&info, &[dedicated.clone()]);

        let entity = EntityId::new(Uuid::new_v4());
        let isolated = service.resolve(ServiceType::TbCore, tenant, entity).unwrap();
        assert_eq!(isolated.tenant_id, Some(tenant));

        let other = TenantId::new(Uuid::new_v4());
        let shared = service.resolve(ServiceType::TbCore, other, entity).unwrap();
        assert_eq!(shared.tenant_id, None);

        // The dedicated instance sees the mirrored picture: it owns the
        // isolated ring, not the shared one.
        let (dedicated_service, _) = partition_service_for(&dedicated, &core_settings());
        dedicated_service.recalculate_partitions(&dedicated, &[info]);
        let owned = dedicated_service.get_current_partitions(ServiceType::TbCore);
        assert_eq!(owned.len(), 100);
        assert!(owned.iter().all(|tpi| tpi.tenant_id == Some(tenant)));
    }

    #[test]
    fn test_membership_change_emits_both_events() {
        let a = service_info("core-a", &[ServiceType::TbCore]);
        let b = service_info("core-b", &[ServiceType::TbCore]);

        let (service, recorder) = partition_service_for(&a, &core_settings());
        service.recalculate_partitions(&a, &[b]);
        recorder.clear();

        // Peer b leaves.
        service.recalculate_partitions(&a, &[]);

        let partition_changes = recorder.partition_changes();
        assert_eq!(partition_changes.len(), 1);
        assert_eq!(
            partition_changes[0].service_key,
            ServiceKey::system(ServiceType::TbCore)
        );
        assert_eq!(partition_changes[0].partitions.len(), 100);

        let topology_changes = recorder.topology_changes();
        assert_eq!(topology_changes.len(), 1);
        assert!(topology_changes[0]
            .service_keys
            .contains(&ServiceKey::system(ServiceType::TbCore)));

        // Partition-change events are delivered before the topology event.
        let events = recorder.events();
        assert!(events.last().unwrap().is_topology_change());
    }

    #[test]
    fn test_no_events_when_membership_is_stable() {
        let a = service_info("core-a", &[ServiceType::TbCore]);
        let b = service_info("core-b", &[ServiceType::TbCore]);

        let (service, recorder) = partition_service_for(&a, &core_settings());
        service.recalculate_partitions(&a, &[b.clone()]);
        recorder.clear();

        service.recalculate_partitions(&a, &[b]);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_churn_bound_on_instance_join() {
        let settings = core_settings();
        let before = ownership_map(
            &["core-1", "core-2", "core-3", "core-4", "core-5"],
            &settings,
        );
        let after = ownership_map(
            &["core-1", "core-2", "core-3", "core-4", "core-5", "core-6"],
            &settings,
        );

        let moved = (0..settings.core_partitions)
            .filter(|p| before.get(p) != after.get(p))
            .count();
        // Expectation is P/(R+1) ≈ 17 moves; anything near half the space
        // means the ring is reshuffling instead of rebalancing.
        assert!(moved > 0, "adding an instance must move something");
        assert!(moved <= 50, "churn too high: {moved} partitions moved");

        // Every move lands on the new instance.
        for p in 0..settings.core_partitions {
            if before.get(&p) != after.get(&p) {
                assert_eq!(after.get(&p).map(String::as_str), Some("core-6"));
            }
        }
    }

    #[test]
    fn test_resolve_flag_consistent_with_owned_set() {
        let a = service_info("core-a", &[ServiceType::TbCore]);
        let b = service_info("core-b", &[ServiceType::TbCore]);

        let (service, _) = partition_service_for(&a, &core_settings());
        service.recalculate_partitions(&a, &[b]);

        let owned: HashSet<u32> = service
            .get_current_partitions(ServiceType::TbCore)
            .iter()
            .filter_map(|tpi| tpi.partition)
            .collect();

        for _ in 0..50 {
            let entity = EntityId::new(Uuid::new_v4());
            let tpi = service
                .resolve(ServiceType::TbCore, TenantId::SYSTEM, entity)
                .unwrap();
            assert_eq!(
                tpi.my_partition,
                owned.contains(&tpi.partition.unwrap()),
                "stale ownership flag for partition {:?}",
                tpi.partition
            );
        }
    }

    #[test]
    fn test_cache_is_coherent_across_recalculation() {
        let a = service_info("core-a", &[ServiceType::TbCore]);
        let b = service_info("core-b", &[ServiceType::TbCore]);
        let entity = EntityId::new(Uuid::new_v4());

        let (service, _) = partition_service_for(&a, &core_settings());
        service.recalculate_partitions(&a, &[]);
        let solo = service
            .resolve(ServiceType::TbCore, TenantId::SYSTEM, entity)
            .unwrap();
        assert!(solo.my_partition);

        // b joins; any partition that moved to b must stop reading as ours,
        // even though the earlier resolve populated the cache.
        service.recalculate_partitions(&a, &[b]);
        let owned: HashSet<u32> = service
            .get_current_partitions(ServiceType::TbCore)
            .iter()
            .filter_map(|tpi| tpi.partition)
            .collect();
        let shared = service
            .resolve(ServiceType::TbCore, TenantId::SYSTEM, entity)
            .unwrap();
        assert_eq!(shared.partition, solo.partition);
        assert_eq!(
            shared.my_partition,
            owned.contains(&shared.partition.unwrap())
        );
    }

    #[test]
    fn test_monolith_owns_both_roles() {
        let info = service_info(
            "monolith-1",
            &[ServiceType::TbCore, ServiceType::TbRuleEngine],
        );
        let (service, _) = partition_service_for(&info, &core_settings());
        service.recalculate_partitions(&info, &[]);

        assert_eq!(
            service.get_current_partitions(ServiceType::TbCore).len(),
            100
        );
        let rule = service.get_current_partitions(ServiceType::TbRuleEngine);
        assert_eq!(rule.len(), 100);
        assert!(rule.iter().all(|tpi| tpi.topic == "tb_rule_engine"));
    }

    #[test]
    fn test_tenant_isolation_survives_peer_departure() {
        // Isolation is learned additively and is not pruned when the
        // dedicated peer leaves; a future authoritative source replaces it
        // through the hook instead.
        let tenant = TenantId::new(Uuid::new_v4());
        let info = service_info("core-1", &[ServiceType::TbCore]);
        let dedicated = isolated_service_info("core-t1", &[ServiceType::TbCore], tenant);

        let (service, _) = partition_service_for(&info, &core_settings());
        service.recalculate_partitions(&info, &[dedicated]);
        service.recalculate_partitions(&info, &[]);

        let entity = EntityId::new(Uuid::new_v4());
        let tpi = service.resolve(ServiceType::TbCore, tenant, entity).unwrap();
        assert_eq!(tpi.tenant_id, Some(tenant));
        // Nobody serves the isolated ring any more.
        assert!(!tpi.my_partition);
    }

    #[test]
    fn test_different_hash_functions_still_partition_the_space() {
        for name in ["murmur3_32", "murmur3_128", "crc32", "md5"] {
            let settings = PartitionSettings::default().with_hash_function_name(name);
            let owners = ownership_map(&["core-a", "core-b", "core-c"], &settings);
            assert_eq!(owners.len(), 100, "hash {name}");
        }
    }
}
